//! Event routing commands
//!
//! - `sendevent [-nifcm] <event> <target> [params]`: immediate, one target
//! - `sendevent -g [-nifcm] <group> <event> [params]`: queued to a group
//! - `sendevent -r [-nifcm] <radius> <event> [params]`: queued by distance
//! - setevent, setmainevent

use crate::command::{CommandRegistry, CommandResult};
use crate::context::Context;
use crate::entity::{Entity, EntityFlags, EntityId};
use crate::event::{EventName, ScriptParameters};
use crate::queue::QueuedEvent;
use crate::value::{is_number, is_system_var, VarKey};
use crate::ScriptError;

/// Register event routing commands
pub fn register(registry: &mut CommandRegistry) -> Result<(), ScriptError> {
    registry.register_fn("sendevent", sendevent)?;
    registry.register_fn("setevent", setevent)?;
    registry.register_fn("setmainevent", setmainevent)?;
    Ok(())
}

/// Receivers of a broadcast
enum Selector {
    Group(String),
    Radius(f64),
}

impl Selector {
    fn matches(&self, sender: Option<&Entity>, entity: &Entity) -> bool {
        match self {
            Self::Group(group) => entity.groups.contains(group),
            Self::Radius(radius) => sender.map_or(false, |s| s.distance_to(entity) <= *radius),
        }
    }
}

fn type_mask(flags: &str) -> EntityFlags {
    let mut mask = EntityFlags::empty();
    for flag in flags.chars() {
        mask |= match flag {
            'n' => EntityFlags::NPC,
            'i' => EntityFlags::ITEM,
            'f' => EntityFlags::FIX,
            'c' => EntityFlags::CAMERA,
            'm' => EntityFlags::MARKER,
            _ => EntityFlags::empty(),
        };
    }
    mask
}

fn read_parameters(ctx: &mut Context<'_>) -> ScriptParameters {
    if ctx.has_more_on_line() {
        ScriptParameters::parse(&ctx.get_word())
    } else {
        ScriptParameters::new()
    }
}

fn sendevent(ctx: &mut Context<'_>) -> CommandResult {
    let flags = ctx.get_flags();
    let mask = type_mask(&flags);

    let selector = if flags.contains('g') {
        Some(Selector::Group(ctx.get_word()))
    } else if flags.contains('r') {
        let word = ctx.get_word();
        if is_number(&word) || is_system_var(&word) || VarKey::parse(&word).is_some() {
            Some(Selector::Radius(ctx.get_float_var(&word)))
        } else {
            ctx.debug(format!("sendevent -r with group '{}'", word));
            Some(Selector::Group(word))
        }
    } else {
        None
    };

    let event = EventName::parse(&ctx.get_word());

    let Some(selector) = selector else {
        let target_word = ctx.get_word();
        let parameters = read_parameters(ctx);
        let Some(target) = ctx.resolve_entity(&target_word) else {
            ctx.warn_at(&target_word, format!("sendevent: unknown target '{}'", target_word));
            return CommandResult::Failed;
        };
        ctx.send_event(target, &event, &parameters);
        return CommandResult::Success;
    };

    let parameters = read_parameters(ctx);
    let this = ctx.entity();
    let world = ctx.world();
    let sender = world.entities.get(this);
    let targets: Vec<EntityId> = world
        .entities
        .iter()
        .filter(|(id, entity)| {
            *id != this
                && (mask.is_empty() || entity.flags.intersects(mask))
                && selector.matches(sender, entity)
        })
        .map(|(id, _)| id)
        .collect();

    let queue = &mut ctx.world_mut().queue;
    let mut queued = 0;
    for target in targets {
        let accepted = queue.push(QueuedEvent {
            sender: Some(this),
            target,
            event: event.clone(),
            parameters: parameters.clone(),
        });
        if accepted {
            queued += 1;
        }
    }
    ctx.debug(format!("sendevent {} queued for {} entities", event, queued));
    CommandResult::Success
}

fn setevent(ctx: &mut Context<'_>) -> CommandResult {
    let name = ctx.get_word();
    let enabled = ctx.get_bool();
    let Some(message) = EventName::parse(&name).message() else {
        ctx.warn(format!("setevent: '{}' is not a fixed event", name));
        return CommandResult::Failed;
    };
    let Some(entity) = ctx.this_mut() else {
        return CommandResult::Failed;
    };
    if enabled {
        entity.disabled_events.remove(&message);
    } else {
        entity.disabled_events.insert(message);
    }
    CommandResult::Success
}

fn setmainevent(ctx: &mut Context<'_>) -> CommandResult {
    let name = ctx.get_word();
    if name.is_empty() {
        ctx.warn("setmainevent: missing event name");
        return CommandResult::Failed;
    }
    match ctx.this_mut() {
        Some(entity) => {
            entity.main_event = EventName::parse(&name);
            CommandResult::Success
        }
        None => CommandResult::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{engine_with, init, run};
    use crate::event::{ScriptMessage, ScriptResult};
    use crate::value::VarValue;

    #[test]
    fn test_type_mask() {
        assert_eq!(type_mask(""), EntityFlags::empty());
        assert_eq!(type_mask("gn"), EntityFlags::NPC);
        assert_eq!(type_mask("if"), EntityFlags::ITEM | EntityFlags::FIX);
    }

    #[test]
    fn test_sendevent_to_target_runs_now() {
        let (mut engine, npc) = engine_with(&init("sendevent hello door_0001 \"a b\"\n accept"));
        let door = engine.spawn(
            Entity::new("door", EntityFlags::FIX).with_script(crate::source::ScriptSource::new(
                "door",
                "on hello {\n set $got ^$param2\n set $from ^sender\n accept\n}\n",
            )),
        );
        engine.send(npc, ScriptMessage::Init).unwrap();
        assert!(engine.entity(door).is_some());
        assert_eq!(engine.global("$got"), Some(VarValue::Text("b".into())));
        assert_eq!(engine.global("$from"), Some(VarValue::Text("npc_0001".into())));
        assert!(engine.queue().is_empty());
    }

    #[test]
    fn test_sendevent_unknown_target() {
        let (_, _, result) = run(&init("sendevent hello nobody\n refuse"));
        assert_eq!(result, ScriptResult::Refuse);
    }

    #[test]
    fn test_group_sendevent_is_queued() {
        let (mut engine, npc) = engine_with(&init("setgroup guards\n sendevent -g guards alarm\n accept"));
        let a = engine.spawn(Entity::new("guard", EntityFlags::NPC).with_group("guards"));
        let b = engine.spawn(Entity::new("guard", EntityFlags::NPC));
        engine.send(npc, ScriptMessage::Init).unwrap();

        let targets: Vec<EntityId> = engine.queue().iter().map(|e| e.target).collect();
        assert_eq!(targets, vec![a]);
        assert!(!targets.contains(&b));
        assert_eq!(engine.queue().iter().next().unwrap().sender, Some(npc));
    }

    #[test]
    fn test_radius_sendevent() {
        let (mut engine, npc) = engine_with(&init("sendevent -rn 10 alarm\n accept"));
        let near = engine.spawn(Entity::new("guard", EntityFlags::NPC).with_position([3.0, 4.0, 0.0]));
        engine.spawn(Entity::new("guard", EntityFlags::NPC).with_position([30.0, 0.0, 0.0]));
        engine.spawn(Entity::new("crate", EntityFlags::ITEM).with_position([1.0, 0.0, 0.0]));
        engine.send(npc, ScriptMessage::Init).unwrap();

        let targets: Vec<EntityId> = engine.queue().iter().map(|e| e.target).collect();
        assert_eq!(targets, vec![near]);
    }

    #[test]
    fn test_setevent_disables() {
        let script = "on init {\n setevent hit off\n accept\n}\non hit {\n set #hit 1\n accept\n}\n";
        let (mut engine, id) = engine_with(script);
        engine.send(id, ScriptMessage::Init).unwrap();
        assert_eq!(engine.send(id, ScriptMessage::Hit).unwrap(), ScriptResult::Refuse);
        assert_eq!(engine.global("#hit"), Some(VarValue::Int(0)));
    }

    #[test]
    fn test_setmainevent() {
        let (engine, id, _) = run(&init("setmainevent patrol\n accept"));
        assert_eq!(engine.entity(id).unwrap().main_event, EventName::parse("patrol"));
    }
}
