//! Read-only `^` system variables
//!
//! The engine answers the names it owns; everything else is asked of the
//! [`ScriptHost`](crate::host::ScriptHost). An unanswered name reads as the
//! zero value implied by its second character.

use crate::context::Context;
use crate::value::{VarType, VarValue};

/// Distance reported for entities that cannot be found
pub const UNKNOWN_DISTANCE: f64 = 99_999_999_999.0;

/// Resolve a `^name` token
pub fn resolve(ctx: &mut Context<'_>, token: &str) -> VarValue {
    if let Some(value) = resolve_builtin(ctx, token) {
        return value;
    }

    let entity = ctx.entity();
    if let Some(value) = ctx.world_mut().host_mut().system_var(entity, token) {
        return value;
    }

    ctx.warn(format!("unknown system variable {}", token));
    fallback_type(token).zero()
}

/// Type implied by the character after `^`
pub fn fallback_type(token: &str) -> VarType {
    match token.chars().nth(1) {
        Some('#') => VarType::Int,
        Some('$') => VarType::Text,
        _ => VarType::Float,
    }
}

fn param(ctx: &Context<'_>, index: &str) -> Option<String> {
    let n: usize = index.parse().ok()?;
    let value = n.checked_sub(1).and_then(|i| ctx.parameters().get(i));
    Some(value.unwrap_or("").to_string())
}

fn resolve_builtin(ctx: &mut Context<'_>, token: &str) -> Option<VarValue> {
    let name = token.strip_prefix('^')?;

    match name {
        "me" => return Some(VarValue::Text(ctx.ident())),
        "sender" => {
            let sender = ctx.world().entities().ident_of(ctx.sender());
            return Some(VarValue::Text(sender));
        }
        "gameseconds" | "gameminutes" | "gamehours" | "gamedays" => {
            let seconds = ctx.world().clock().as_secs() as i64;
            let value = match name {
                "gameseconds" => seconds,
                "gameminutes" => seconds / 60,
                "gamehours" => seconds / 3600,
                _ => seconds / 86_400,
            };
            return Some(VarValue::Int(value));
        }
        _ => {}
    }

    if let Some(index) = name.strip_prefix("$param") {
        return param(ctx, index).map(VarValue::Text);
    }
    if let Some(index) = name.strip_prefix("&param") {
        return param(ctx, index).map(|p| VarValue::Float(crate::value::parse_number(&p)));
    }
    if let Some(index) = name.strip_prefix("#param") {
        return param(ctx, index).map(|p| VarValue::Int(crate::value::parse_number(&p) as i64));
    }

    if let Some(index) = name.strip_prefix("#timer") {
        let slot: usize = index.parse().ok()?;
        let started = slot
            .checked_sub(1)
            .and_then(|i| ctx.this()?.stopwatches.get(i).copied().flatten());
        let elapsed = started
            .map(|start| ctx.world().clock().saturating_sub(start).as_millis() as i64)
            .unwrap_or(0);
        return Some(VarValue::Int(elapsed));
    }

    if let Some(max) = name.strip_prefix("rnd_") {
        let max = crate::value::parse_number(max);
        return Some(VarValue::Float(ctx.world_mut().random(max)));
    }

    if let Some(target) = name.strip_prefix("dist_") {
        let distance = ctx
            .resolve_entity(target)
            .and_then(|id| {
                let other = ctx.world().entities().get(id)?;
                Some(ctx.this()?.distance_to(other))
            })
            .unwrap_or(UNKNOWN_DISTANCE);
        return Some(VarValue::Float(distance));
    }

    None
}
