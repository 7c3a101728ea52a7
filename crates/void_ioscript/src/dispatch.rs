//! Event dispatcher
//!
//! Runs one event on one entity: the override script first, then the class
//! script, each from its `on <event>` header until a command ends the
//! dispatch or the event block closes.

use std::sync::Arc;

use crate::command::{CommandRegistry, CommandResult};
use crate::commands::timer::timer_command;
use crate::context::Context;
use crate::entity::EntityId;
use crate::event::{EventName, ScriptMessage, ScriptParameters, ScriptResult};
use crate::source::ScriptSource;
use crate::world::ScriptWorld;

/// How the command loop reads its input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// From an `on <event>` header through its block
    Event,
    /// One line from an explicit position
    Line,
}

/// Brace tracking of the command loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Brackets {
    /// Depth inside the event block; closing it ends the dispatch
    Event(usize),
    /// A jump landed outside any block; counting the block entered since
    Nested(usize),
    Off,
}

impl Brackets {
    /// Tracking after the cursor moved to `pos`
    fn landed(source: &ScriptSource, pos: usize) -> Self {
        match source.block_depth(pos) {
            0 => Self::Off,
            depth => Self::Event(depth),
        }
    }
}

/// Deliver an event to an entity right away
pub fn send_event(
    registry: &CommandRegistry,
    world: &mut ScriptWorld,
    sender: Option<EntityId>,
    target: EntityId,
    event: &EventName,
    parameters: &ScriptParameters,
) -> ScriptResult {
    deliver(registry, world, sender, target, event, parameters, false)
}

/// Dry-run an event using each command's side-effect free path
pub fn peek_event(
    registry: &CommandRegistry,
    world: &mut ScriptWorld,
    sender: Option<EntityId>,
    target: EntityId,
    event: &EventName,
    parameters: &ScriptParameters,
) -> ScriptResult {
    deliver(registry, world, sender, target, event, parameters, true)
}

fn deliver(
    registry: &CommandRegistry,
    world: &mut ScriptWorld,
    sender: Option<EntityId>,
    target: EntityId,
    event: &EventName,
    parameters: &ScriptParameters,
    peek: bool,
) -> ScriptResult {
    let Some(entity) = world.entities.get(target) else {
        return ScriptResult::Refuse;
    };
    if !entity.is_event_enabled(event) {
        return ScriptResult::Refuse;
    }
    if event.is(ScriptMessage::Main) && !entity.in_active_zone {
        return ScriptResult::Accept;
    }

    let over_script = entity.over_script.clone();
    let script = entity.script.clone();

    if over_script.is_valid() {
        let result = run_event(
            registry,
            world,
            over_script,
            sender,
            target,
            event,
            parameters,
            peek,
        );
        if matches!(result, ScriptResult::Refuse | ScriptResult::Destructive)
            || !world.entities.contains(target)
        {
            return result;
        }
    }

    run_event(registry, world, script, sender, target, event, parameters, peek)
}

#[allow(clippy::too_many_arguments)]
fn run_event(
    registry: &CommandRegistry,
    world: &mut ScriptWorld,
    source: Arc<ScriptSource>,
    sender: Option<EntityId>,
    entity: EntityId,
    event: &EventName,
    parameters: &ScriptParameters,
    peek: bool,
) -> ScriptResult {
    if !source.is_valid() {
        return ScriptResult::Accept;
    }
    let Some(pos) = source.find_event(event) else {
        return ScriptResult::Accept;
    };
    if !enter(world, &source, event) {
        return ScriptResult::Error;
    }

    let result = {
        let mut ctx = Context::new(registry, world, source, entity, event.clone())
            .at(pos)
            .from_sender(sender)
            .with_parameters(parameters.clone())
            .peeking(peek);
        run(&mut ctx, Mode::Event)
    };

    world.depth -= 1;
    result
}

/// Re-enter a script at `pos` in single-line mode
pub(crate) fn resume(
    registry: &CommandRegistry,
    world: &mut ScriptWorld,
    source: Arc<ScriptSource>,
    entity: EntityId,
    pos: usize,
    timer: Option<String>,
    parameters: ScriptParameters,
) -> ScriptResult {
    if !world.entities.contains(entity) {
        return ScriptResult::Refuse;
    }
    let event = EventName::Message(ScriptMessage::ExecuteLine);
    if !enter(world, &source, &event) {
        return ScriptResult::Error;
    }

    let result = {
        let mut ctx = Context::new(registry, world, source, entity, event)
            .at(pos)
            .in_timer(timer)
            .with_parameters(parameters);
        run(&mut ctx, Mode::Line)
    };

    world.depth -= 1;
    result
}

fn enter(world: &mut ScriptWorld, source: &ScriptSource, event: &EventName) -> bool {
    if world.depth >= world.config.max_dispatch_depth {
        log::error!(
            target: "ioscript",
            "[{}] {}: dispatch nested deeper than {}, aborted",
            source.name(),
            event,
            world.config.max_dispatch_depth
        );
        return false;
    }
    world.depth += 1;
    true
}

fn run(ctx: &mut Context<'_>, mode: Mode) -> ScriptResult {
    let entity = ctx.entity();
    let mut line_mode = mode == Mode::Line;
    let mut brackets = Brackets::Event(1);

    if mode == Mode::Event {
        let word = ctx.get_command(true);
        if word != "{" {
            ctx.warn_at(&word, format!("expected '{{' after event header, found '{}'", word));
            return ScriptResult::Accept;
        }
    }

    loop {
        let word = ctx.get_command(!line_mode);

        if word.is_empty() {
            if line_mode {
                return ScriptResult::Accept;
            }
            ctx.warn("missing '}' before end of script");
            return ScriptResult::Accept;
        }

        log::trace!(target: "ioscript", "{} {}: {}", ctx.source().name(), ctx.ident(), word);

        let result = if let Some(command) = ctx.registry().get(&word) {
            let required = command.required();
            let allowed = required.is_empty()
                || ctx.this().map_or(false, |e| e.flags.intersects(required));
            if !allowed {
                ctx.warn_at(&word, format!("command '{}' cannot run on this entity", word));
                ctx.skip_command();
                Some(CommandResult::Failed)
            } else if ctx.is_peek() {
                Some(command.peek(ctx))
            } else {
                Some(command.execute(ctx))
            }
        } else if word.starts_with(">>") {
            ctx.skip_command();
            None
        } else if let Some(name) = word.strip_prefix("timer") {
            if ctx.is_peek() {
                Some(CommandResult::AbortRefuse)
            } else {
                Some(timer_command(ctx, name))
            }
        } else if word == "{" {
            brackets = match brackets {
                Brackets::Event(depth) => Brackets::Event(depth + 1),
                Brackets::Nested(depth) => Brackets::Nested(depth + 1),
                Brackets::Off => Brackets::Nested(1),
            };
            None
        } else if word == "}" {
            match brackets {
                Brackets::Event(1) => {
                    if ctx
                        .world()
                        .suppressions()
                        .resumes_block(ctx.source().name(), ctx.position())
                    {
                        ctx.debug("suppressed: block end without accept or refuse");
                    } else {
                        ctx.warn_at("}", "missing accept or refuse before end of event block");
                        return ScriptResult::Accept;
                    }
                }
                Brackets::Event(depth) => brackets = Brackets::Event(depth - 1),
                Brackets::Nested(1) => brackets = Brackets::Off,
                Brackets::Nested(depth) => brackets = Brackets::Nested(depth - 1),
                Brackets::Off => {}
            }
            None
        } else if word == "on" && brackets == Brackets::Off {
            ctx.warn_at("on", "ran into another event without accept or refuse");
            return ScriptResult::Accept;
        } else {
            ctx.warn_at(&word, format!("unknown command '{}'", word));
            ctx.skip_command();
            None
        };

        match result {
            Some(CommandResult::AbortAccept) => return ScriptResult::Accept,
            Some(CommandResult::AbortRefuse) => return ScriptResult::Refuse,
            Some(CommandResult::AbortError) => return ScriptResult::Error,
            Some(CommandResult::AbortDestructive) => return ScriptResult::Destructive,
            Some(CommandResult::Jumped) => {
                brackets = Brackets::landed(ctx.source(), ctx.position());
                line_mode = false;
            }
            Some(CommandResult::Success) | Some(CommandResult::Failed) | None => {}
        }

        if !ctx.world().entities().contains(entity) {
            return ScriptResult::Destructive;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScriptConfig;
    use crate::entity::{Entity, EntityFlags};

    fn setup(script: &str) -> (CommandRegistry, ScriptWorld, EntityId) {
        let registry = CommandRegistry::with_builtins().unwrap();
        let mut world = ScriptWorld::new(ScriptConfig::default().with_seed(5));
        let id = world.entities_mut().spawn(
            Entity::new("chest", EntityFlags::FIX).with_script(ScriptSource::new("chest", script)),
        );
        (registry, world, id)
    }

    fn send(script: &str, event: &str) -> (ScriptResult, ScriptWorld) {
        let (registry, mut world, id) = setup(script);
        let result = send_event(
            &registry,
            &mut world,
            None,
            id,
            &EventName::parse(event),
            &ScriptParameters::new(),
        );
        (result, world)
    }

    #[test]
    fn test_accept_and_refuse() {
        assert_eq!(send("on init {\n accept\n}\n", "init").0, ScriptResult::Accept);
        assert_eq!(send("on init {\n refuse\n}\n", "init").0, ScriptResult::Refuse);
    }

    #[test]
    fn test_missing_event_is_silent_accept() {
        assert_eq!(send("on init {\n refuse\n}\n", "hit").0, ScriptResult::Accept);
    }

    #[test]
    fn test_missing_opening_brace() {
        assert_eq!(send("on init refuse\n", "init").0, ScriptResult::Accept);
    }

    #[test]
    fn test_block_end_is_accept() {
        let (result, world) = send("on init {\n set #x 1\n}\n", "init");
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(world.globals().int("x"), 1);
    }

    #[test]
    fn test_nested_blocks_are_counted() {
        let (result, _) = send("on init {\n { set #x 1 }\n refuse\n}\n", "init");
        assert_eq!(result, ScriptResult::Refuse);
    }

    #[test]
    fn test_unknown_command_skips_line() {
        let (result, world) = send("on init {\n frobnicate #x 9\n set #y 2\n refuse\n}\n", "init");
        assert_eq!(result, ScriptResult::Refuse);
        assert_eq!(world.globals().int("y"), 2);
        assert_eq!(world.globals().int("x"), 0);
    }

    #[test]
    fn test_underscores_in_command_names() {
        let (_, world) = send("on init {\n s_e_t #x 4\n accept\n}\n", "init");
        assert_eq!(world.globals().int("x"), 4);
    }

    #[test]
    fn test_missing_closing_brace() {
        assert_eq!(send("on init {\n set #x 1\n", "init").0, ScriptResult::Accept);
    }

    #[test]
    fn test_capability_mask_blocks_command() {
        let (result, _) = send("on init {\n behavior guard\n refuse\n}\n", "init");
        assert_eq!(result, ScriptResult::Refuse);
    }

    #[test]
    fn test_override_script_runs_first() {
        let (registry, mut world, id) = setup("on init {\n set #class 1\n accept\n}\n");
        world.entities_mut().get_mut(id).unwrap().over_script =
            Arc::new(ScriptSource::new("over", "on init {\n set #over 1\n refuse\n}\n"));

        let result = send_event(
            &registry,
            &mut world,
            None,
            id,
            &ScriptMessage::Init.into(),
            &ScriptParameters::new(),
        );
        assert_eq!(result, ScriptResult::Refuse);
        assert_eq!(world.globals().int("over"), 1);
        assert_eq!(world.globals().int("class"), 0);
    }

    #[test]
    fn test_override_accept_falls_through() {
        let (registry, mut world, id) = setup("on init {\n set #class 1\n refuse\n}\n");
        world.entities_mut().get_mut(id).unwrap().over_script =
            Arc::new(ScriptSource::new("over", "on init {\n set #over 1\n accept\n}\n"));

        let result = send_event(
            &registry,
            &mut world,
            None,
            id,
            &ScriptMessage::Init.into(),
            &ScriptParameters::new(),
        );
        assert_eq!(result, ScriptResult::Refuse);
        assert_eq!(world.globals().int("over"), 1);
        assert_eq!(world.globals().int("class"), 1);
    }

    #[test]
    fn test_missing_target_is_refuse() {
        let (registry, mut world, id) = setup("on init {\n accept\n}\n");
        world.entities_mut().remove(id);
        let result = send_event(
            &registry,
            &mut world,
            None,
            id,
            &ScriptMessage::Init.into(),
            &ScriptParameters::new(),
        );
        assert_eq!(result, ScriptResult::Refuse);
    }

    #[test]
    fn test_main_skipped_outside_zone() {
        let (registry, mut world, id) = setup("on main {\n refuse\n}\n");
        world.entities_mut().get_mut(id).unwrap().in_active_zone = false;
        let result = send_event(
            &registry,
            &mut world,
            None,
            id,
            &ScriptMessage::Main.into(),
            &ScriptParameters::new(),
        );
        assert_eq!(result, ScriptResult::Accept);
    }

    #[test]
    fn test_resume_runs_one_line() {
        let text = "on init {\n set #a 1 set #b 2\n set #c 3\n accept\n}\n";
        let (registry, mut world, id) = setup(text);
        let source = world.entities().get(id).unwrap().script.clone();
        let pos = text.find("set #b").unwrap();

        let result = resume(&registry, &mut world, source, id, pos, None, ScriptParameters::new());
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(world.globals().int("a"), 0);
        assert_eq!(world.globals().int("b"), 2);
        assert_eq!(world.globals().int("c"), 0);
    }

    #[test]
    fn test_jump_inside_block_stops_at_its_end() {
        let (result, world) = send(
            "on init {\n goto a\n >>a\n set #x 1\n}\n\non hit {\n set #hit 1\n accept\n}\n",
            "init",
        );
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(world.globals().int("x"), 1);
        assert_eq!(world.globals().int("hit"), 0);
    }

    #[test]
    fn test_jump_into_nested_block_counts_outer_brace() {
        let (_, world) = send(
            "on init {\n goto deep\n if (1 == 2) {\n >>deep\n set #x 1\n }\n set #y 1\n}\non hit {\n set #hit 1\n accept\n}\n",
            "init",
        );
        assert_eq!(world.globals().int("x"), 1);
        assert_eq!(world.globals().int("y"), 1);
        assert_eq!(world.globals().int("hit"), 0);
    }

    #[test]
    fn test_return_restores_block_tracking() {
        let (_, world) = send(
            "on init {\n gosub sub\n set #back 1\n}\n>>sub\n if (1 == 1) { set #sub 1 }\n return\non hit {\n set #hit 1\n accept\n}\n",
            "init",
        );
        assert_eq!(world.globals().int("sub"), 1);
        assert_eq!(world.globals().int("back"), 1);
        assert_eq!(world.globals().int("hit"), 0);
    }

    #[test]
    fn test_top_level_code_stops_at_next_event() {
        let (result, world) = send(
            "on init {\n goto after\n}\n>>after\n set #x 1\non hit {\n set #hit 1\n accept\n}\n",
            "init",
        );
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(world.globals().int("x"), 1);
        assert_eq!(world.globals().int("hit"), 0);
    }

    #[test]
    fn test_label_line_skipped_by_flow() {
        let (_, world) = send("on init {\n >>a set #x 1\n set #y 1\n accept\n}\n", "init");
        assert_eq!(world.globals().int("x"), 0);
        assert_eq!(world.globals().int("y"), 1);

        let (_, world) = send("on init {\n goto a\n >>a set #x 1\n accept\n}\n", "init");
        assert_eq!(world.globals().int("x"), 1);
    }

    #[test]
    fn test_depth_guard() {
        let (registry, mut world, id) =
            setup("on init {\n sendevent init self \"\"\n accept\n}\n");
        let result = send_event(
            &registry,
            &mut world,
            None,
            id,
            &ScriptMessage::Init.into(),
            &ScriptParameters::new(),
        );
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(world.depth, 0);
    }
}
