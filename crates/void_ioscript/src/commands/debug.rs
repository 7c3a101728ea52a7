//! Variable dumps: showlocals, showglobals, showvars

use crate::command::{CommandRegistry, CommandResult};
use crate::context::Context;
use crate::value::{VarKey, VarScope};
use crate::variables::VariableTable;
use crate::ScriptError;

/// Register debug commands
pub fn register(registry: &mut CommandRegistry) -> Result<(), ScriptError> {
    registry.register_pure("showlocals", |ctx| {
        show_locals(ctx);
        CommandResult::Success
    })?;
    registry.register_pure("showglobals", |ctx| {
        show_globals(ctx);
        CommandResult::Success
    })?;
    registry.register_pure("showvars", |ctx| {
        show_globals(ctx);
        show_locals(ctx);
        CommandResult::Success
    })?;
    Ok(())
}

fn dump(table: &VariableTable, scope: VarScope) -> String {
    let mut out = String::new();
    for (ty, name, value) in table.iter() {
        let key = VarKey::new(scope, ty, name);
        out.push_str(&format!("\n    {} = {}", key, value));
    }
    out
}

fn show_locals(ctx: &Context<'_>) {
    let ident = ctx.ident();
    match ctx.this() {
        Some(entity) => log::info!(
            target: "ioscript",
            "local variables of {} ({}):{}",
            ident,
            entity.locals.len(),
            dump(&entity.locals, VarScope::Local)
        ),
        None => log::info!(target: "ioscript", "{} has no local variables", ident),
    }
}

fn show_globals(ctx: &Context<'_>) {
    let globals = ctx.world().globals();
    log::info!(
        target: "ioscript",
        "global variables ({}):{}",
        globals.len(),
        dump(globals, VarScope::Global)
    );
}
