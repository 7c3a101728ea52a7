//! Gameplay commands forwarded to the [`ScriptHost`](crate::host::ScriptHost)
//!
//! The interpreter only parses these: flags, then a fixed number of
//! argument words. The host decides what they mean.

use crate::command::{Command, CommandRegistry, CommandResult};
use crate::context::Context;
use crate::entity::EntityFlags;
use crate::host::{HostCommand, HostResponse};
use crate::timer::ScriptTimer;
use crate::ScriptError;

/// A command handed to the host after argument parsing
pub struct HostForward {
    name: &'static str,
    required: EntityFlags,
    arity: usize,
}

impl HostForward {
    pub fn new(name: &'static str, arity: usize) -> Self {
        Self {
            name,
            required: EntityFlags::empty(),
            arity,
        }
    }

    pub fn requiring(mut self, flags: EntityFlags) -> Self {
        self.required = flags;
        self
    }
}

impl Command for HostForward {
    fn name(&self) -> &str {
        self.name
    }

    fn required(&self) -> EntityFlags {
        self.required
    }

    fn execute(&self, ctx: &mut Context<'_>) -> CommandResult {
        let flags = ctx.get_flags();
        let args: Vec<String> = (0..self.arity).map(|_| ctx.get_word()).collect();

        let command = HostCommand {
            entity: ctx.entity(),
            ident: ctx.ident(),
            name: self.name.to_string(),
            flags,
            args,
        };
        log::debug!(target: "ioscript::host", "{} {} {:?}", command.ident, command.name, command.args);

        match ctx.world_mut().host_mut().command(&command) {
            HostResponse::Done => CommandResult::Success,
            HostResponse::Failed => {
                ctx.warn(format!("{} failed", self.name));
                CommandResult::Failed
            }
            HostResponse::ResumeAfter(delay) => {
                if let Some(pos) = ctx.skip_command() {
                    let entity = ctx.entity();
                    let world = ctx.world();
                    let timer = ScriptTimer {
                        name: world.timers.default_name(entity),
                        entity,
                        source: ctx.source().clone(),
                        pos,
                        interval: delay,
                        count: 1,
                        start: world.clock,
                        idle: false,
                    };
                    ctx.world_mut().timers.start(timer);
                }
                CommandResult::Success
            }
        }
    }
}

/// Register host-forwarded commands
pub fn register(registry: &mut CommandRegistry) -> Result<(), ScriptError> {
    // Presentation
    registry.register(Box::new(HostForward::new("playanim", 1)))?;
    registry.register(Box::new(HostForward::new("speak", 1)))?;
    registry.register(Box::new(HostForward::new("playsound", 1)))?;

    // NPC movement and AI
    registry.register(Box::new(HostForward::new("behavior", 1).requiring(EntityFlags::NPC)))?;
    registry.register(Box::new(HostForward::new("settarget", 1).requiring(EntityFlags::NPC)))?;
    registry.register(Box::new(HostForward::new("setspeed", 1).requiring(EntityFlags::NPC)))?;

    // Progress
    registry.register(Box::new(HostForward::new("quest", 1)))?;
    Ok(())
}
