//! Entity state commands
//!
//! - setgroup [-r] <group>
//! - destroy <entity>

use crate::command::{CommandRegistry, CommandResult};
use crate::context::Context;
use crate::ScriptError;

/// Register entity commands
pub fn register(registry: &mut CommandRegistry) -> Result<(), ScriptError> {
    registry.register_fn("setgroup", setgroup)?;
    registry.register_fn("destroy", destroy)?;
    Ok(())
}

fn setgroup(ctx: &mut Context<'_>) -> CommandResult {
    let flags = ctx.get_flags();
    let group = ctx.get_word();
    if group.is_empty() {
        ctx.warn("setgroup: missing group name");
        return CommandResult::Failed;
    }
    let Some(entity) = ctx.this_mut() else {
        return CommandResult::Failed;
    };
    if flags.contains('r') {
        entity.groups.remove(&group);
    } else {
        entity.groups.insert(group);
    }
    CommandResult::Success
}

fn destroy(ctx: &mut Context<'_>) -> CommandResult {
    let word = ctx.get_word();
    let Some(target) = ctx.resolve_entity(&word) else {
        ctx.warn_at(&word, format!("destroy: unknown entity '{}'", word));
        return CommandResult::Failed;
    };

    ctx.world_mut().destroy_entity(target);
    if target == ctx.entity() {
        CommandResult::AbortDestructive
    } else {
        CommandResult::Success
    }
}
