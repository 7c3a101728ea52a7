//! Control flow commands
//!
//! - accept, refuse: end the dispatch with a verdict
//! - if, else: conditional blocks
//! - goto, gosub, return: label jumps and subroutines
//! - random: run the next block with a given percent chance

use crate::command::{CommandRegistry, CommandResult};
use crate::condition;
use crate::context::Context;
use crate::ScriptError;

/// Register control flow commands
pub fn register(registry: &mut CommandRegistry) -> Result<(), ScriptError> {
    registry.register_pure("accept", |_| CommandResult::AbortAccept)?;
    registry.register_pure("refuse", |_| CommandResult::AbortRefuse)?;
    registry.register_pure("if", if_command)?;
    registry.register_pure("else", else_command)?;
    registry.register_pure("goto", |ctx| jump(ctx, false))?;
    registry.register_pure("gosub", |ctx| jump(ctx, true))?;
    registry.register_pure("return", return_command)?;
    registry.register_fn("random", random_command)?;
    Ok(())
}

fn if_command(ctx: &mut Context<'_>) -> CommandResult {
    match condition::evaluate(ctx) {
        Some(true) => CommandResult::Success,
        Some(false) => {
            ctx.skip_block();
            ctx.consume_command("else");
            CommandResult::Success
        }
        None => {
            ctx.skip_block();
            ctx.consume_command("else");
            CommandResult::Failed
        }
    }
}

/// Reached only after a taken `if` branch
fn else_command(ctx: &mut Context<'_>) -> CommandResult {
    ctx.skip_block();
    CommandResult::Success
}

fn jump(ctx: &mut Context<'_>, gosub: bool) -> CommandResult {
    let label = ctx.get_word();
    if ctx.jump_to_label(&label, gosub) {
        CommandResult::Jumped
    } else {
        let command = if gosub { "gosub" } else { "goto" };
        ctx.error_at(&label, format!("{}: unknown label '{}'", command, label));
        CommandResult::AbortError
    }
}

fn return_command(ctx: &mut Context<'_>) -> CommandResult {
    if ctx.return_to_caller() {
        CommandResult::Jumped
    } else {
        ctx.error("return without gosub");
        CommandResult::AbortError
    }
}

fn random_command(ctx: &mut Context<'_>) -> CommandResult {
    let chance = ctx.get_float();
    let draw = ctx.world_mut().random(100.0);
    if draw > chance {
        ctx.skip_block();
    }
    CommandResult::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{init, run};
    use crate::event::ScriptResult;
    use crate::value::VarValue;

    #[test]
    fn test_if_else() {
        let script = init(
            "set #x 1\n if ( #x == 1 ) { set $ok \"yes\" accept } else { set $ok \"no\" refuse }",
        );
        let (engine, _, result) = run(&script);
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(engine.global("$ok"), Some(VarValue::Text("yes".into())));
    }

    #[test]
    fn test_false_if_runs_else() {
        let script = init("if (1 == 2) {\n set #a 1\n} else {\n set #b 1\n}\n refuse");
        let (engine, _, result) = run(&script);
        assert_eq!(result, ScriptResult::Refuse);
        assert_eq!(engine.global("#a"), Some(VarValue::Int(0)));
        assert_eq!(engine.global("#b"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_else_if_chain() {
        let script = init(
            "set #v 2\n if (#v == 1) { set $r one } else if (#v == 2) { set $r two } else { set $r other }\n accept",
        );
        let (engine, _, _) = run(&script);
        assert_eq!(engine.global("$r"), Some(VarValue::Text("two".into())));
    }

    #[test]
    fn test_true_if_skips_else_chain() {
        let script = init(
            "if (1 == 1) { set $r one } else if (1 == 1) { set $r two } else { set $r three }\n accept",
        );
        let (engine, _, _) = run(&script);
        assert_eq!(engine.global("$r"), Some(VarValue::Text("one".into())));
    }

    #[test]
    fn test_single_statement_if() {
        let script = init("if (1 == 2) set #a 1\n set #b 1\n accept");
        let (engine, _, _) = run(&script);
        assert_eq!(engine.global("#a"), Some(VarValue::Int(0)));
        assert_eq!(engine.global("#b"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_failed_condition_skips_body() {
        let script = init("if ($s < 3) { set #a 1 }\n set #b 1\n accept");
        let (engine, _, result) = run(&script);
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(engine.global("#a"), Some(VarValue::Int(0)));
        assert_eq!(engine.global("#b"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_goto() {
        let script = init("goto skip\n set #a 1\n >>skip\n set #b 1\n accept");
        let (engine, _, result) = run(&script);
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(engine.global("#a"), Some(VarValue::Int(0)));
        assert_eq!(engine.global("#b"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_gosub_return() {
        let script = "on init {\n gosub sub\n set #after §calls\n accept\n}\n>>sub\n inc §calls 1\n return\n";
        let (engine, id, result) = run(script);
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(engine.local(id, "§calls"), Some(VarValue::Int(1)));
        assert_eq!(engine.global("#after"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_unknown_label_is_error() {
        let (_, _, result) = run(&init("goto nowhere\n accept"));
        assert_eq!(result, ScriptResult::Error);
    }

    #[test]
    fn test_return_without_gosub_is_error() {
        let (_, _, result) = run(&init("return\n accept"));
        assert_eq!(result, ScriptResult::Error);
    }

    #[test]
    fn test_random_bounds() {
        let script = init("random 100 { set #hit 1 }\n random 0 { set #miss 1 }\n accept");
        let (engine, _, _) = run(&script);
        assert_eq!(engine.global("#hit"), Some(VarValue::Int(1)));
        assert_eq!(engine.global("#miss"), Some(VarValue::Int(0)));
    }
}
