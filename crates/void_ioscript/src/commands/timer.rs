//! Timer commands
//!
//! - `timer<name> [-mi] <count> <interval> <command...>`, or `timer <name> ...`
//! - `timer<name> off`, `timerkill_local`
//! - starttimer, stoptimer: per-entity stopwatches read back as `^#timerN`

use std::time::Duration;

use crate::command::{CommandRegistry, CommandResult};
use crate::context::Context;
use crate::entity::STOPWATCH_COUNT;
use crate::timer::ScriptTimer;
use crate::value::{is_number, is_system_var, VarKey};
use crate::ScriptError;

/// Register stopwatch commands; `timer<name>` is matched by the dispatcher
pub fn register(registry: &mut CommandRegistry) -> Result<(), ScriptError> {
    registry.register_fn("starttimer", |ctx| stopwatch(ctx, true))?;
    registry.register_fn("stoptimer", |ctx| stopwatch(ctx, false))?;
    Ok(())
}

/// Run a `timer<name>` command; `name` is the part after `timer`
///
/// With a bare `timer` the name may also follow as its own word:
/// `timer t 3 1 ...`.
pub fn timer_command(ctx: &mut Context<'_>, name: &str) -> CommandResult {
    let entity = ctx.entity();
    if name == "kill_local" {
        return kill_local(ctx);
    }

    let mut name = name.to_string();
    let mut flags = ctx.get_flags();
    let mut first = ctx.get_word();

    if name.is_empty() && is_timer_name(&first) {
        name = first;
        if name == "kill_local" {
            return kill_local(ctx);
        }
        flags.push_str(&ctx.get_flags());
        first = ctx.get_word();
    }

    if first == "off" {
        if !name.is_empty() {
            ctx.world_mut().timers.stop(entity, &name);
        }
        return CommandResult::Success;
    }

    let count = ctx.get_float_var(&first).max(0.0) as u32;
    let amount = ctx.get_float().max(0.0);
    let seconds = if flags.contains('m') { amount / 1000.0 } else { amount };
    let interval = Duration::try_from_secs_f64(seconds).unwrap_or(Duration::ZERO);

    let Some(pos) = ctx.skip_command() else {
        ctx.warn("timer without a command");
        return CommandResult::Failed;
    };

    let world = ctx.world();
    let name = if name.is_empty() {
        world.timers.default_name(entity)
    } else {
        name
    };
    let timer = ScriptTimer {
        name,
        entity,
        source: ctx.source().clone(),
        pos,
        interval,
        count,
        start: world.clock,
        idle: flags.contains('i'),
    };
    ctx.world_mut().timers.start(timer);
    CommandResult::Success
}

fn kill_local(ctx: &mut Context<'_>) -> CommandResult {
    let entity = ctx.entity();
    let removed = ctx.world_mut().timers.clear_for(entity);
    ctx.debug(format!("killed {} timers", removed));
    CommandResult::Success
}

/// A word after a bare `timer` that names the timer rather than its count
fn is_timer_name(word: &str) -> bool {
    !word.is_empty()
        && word != "off"
        && !is_number(word)
        && !is_system_var(word)
        && VarKey::parse(word).is_none()
}

fn stopwatch(ctx: &mut Context<'_>, start: bool) -> CommandResult {
    let word = ctx.get_word();
    let slot = word
        .strip_prefix("timer")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| (1..=STOPWATCH_COUNT).contains(n));
    let Some(slot) = slot else {
        ctx.warn(format!("invalid stopwatch '{}', expected timer1 to timer{}", word, STOPWATCH_COUNT));
        return CommandResult::Failed;
    };

    let now = ctx.world().clock;
    match ctx.this_mut() {
        Some(entity) => {
            entity.stopwatches[slot - 1] = if start { Some(now) } else { None };
            CommandResult::Success
        }
        None => CommandResult::Failed,
    }
}
