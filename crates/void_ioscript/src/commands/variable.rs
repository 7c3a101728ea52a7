//! Variable commands
//!
//! `set` assigns, the arithmetic family updates numeric variables in place.
//! Integer variables stay exact while the operand is integral; anything else
//! goes through `f64` and is converted back to the variable's type.

use crate::command::{CommandRegistry, CommandResult};
use crate::context::Context;
use crate::value::{is_system_var, parse_number, VarKey, VarType, VarValue};
use crate::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Root,
}

impl Arith {
    fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Mod => "mod",
            Self::Pow => "pow",
            Self::Root => "nthroot",
        }
    }

    fn apply_int(self, a: i64, b: i64) -> Option<i64> {
        match self {
            Self::Add => Some(a.wrapping_add(b)),
            Self::Sub => Some(a.wrapping_sub(b)),
            Self::Mul => Some(a.wrapping_mul(b)),
            Self::Mod => Some(a.wrapping_rem(b)),
            _ => None,
        }
    }

    fn apply_float(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Mod => a % b,
            Self::Pow => a.powf(b),
            Self::Root => a.powf(1.0 / b),
        }
    }
}

/// Register variable commands
pub fn register(registry: &mut CommandRegistry) -> Result<(), ScriptError> {
    registry.register_fn("set", set_command)?;
    registry.register_fn("unset", unset_command)?;

    registry.register_fn("inc", |ctx| arithmetic(ctx, Arith::Add))?;
    registry.register_fn("add", |ctx| arithmetic(ctx, Arith::Add))?;
    registry.register_fn("dec", |ctx| arithmetic(ctx, Arith::Sub))?;
    registry.register_fn("sub", |ctx| arithmetic(ctx, Arith::Sub))?;
    registry.register_fn("mul", |ctx| arithmetic(ctx, Arith::Mul))?;
    registry.register_fn("div", |ctx| arithmetic(ctx, Arith::Div))?;
    registry.register_fn("mod", |ctx| arithmetic(ctx, Arith::Mod))?;
    registry.register_fn("pow", |ctx| arithmetic(ctx, Arith::Pow))?;
    registry.register_fn("nthroot", |ctx| arithmetic(ctx, Arith::Root))?;

    registry.register_fn("++", |ctx| step(ctx, 1))?;
    registry.register_fn("--", |ctx| step(ctx, -1))?;
    Ok(())
}

/// Writable variable named by `token`, reporting anything else
fn target(ctx: &Context<'_>, token: &str) -> Option<VarKey> {
    if is_system_var(token) {
        ctx.warn_at(token, format!("cannot assign to system variable {}", token));
        return None;
    }
    let key = VarKey::parse(token);
    if key.is_none() {
        ctx.warn_at(token, format!("'{}' is not a variable", token));
    }
    key
}

fn is_reference(token: &str) -> bool {
    is_system_var(token) || VarKey::parse(token).is_some()
}

/// Operand value: variables are read, literals keep their text
fn operand(ctx: &mut Context<'_>, token: &str, ty: VarType) -> VarValue {
    if is_reference(token) {
        ctx.get_var(token)
    } else if ty == VarType::Text {
        VarValue::Text(token.to_string())
    } else {
        VarValue::Float(parse_number(token))
    }
}

fn assign(ctx: &mut Context<'_>, key: &VarKey, value: VarValue) -> CommandResult {
    if ctx.set_var(key, value.coerce(key.ty)) {
        CommandResult::Success
    } else {
        CommandResult::Failed
    }
}

fn set_command(ctx: &mut Context<'_>) -> CommandResult {
    let flags = ctx.get_flags();

    if flags.contains('a') {
        let var = ctx.get_word();
        let index = ctx.get_word();
        let list = ctx.get_word();
        let Some(key) = target(ctx, &var) else {
            return CommandResult::Failed;
        };
        let index = ctx.get_int_var(&index);
        let list = if is_reference(&list) {
            ctx.get_string_var(&list)
        } else {
            list
        };
        let element = usize::try_from(index)
            .ok()
            .and_then(|i| list.split_whitespace().nth(i))
            .unwrap_or("")
            .to_string();
        let value = match key.ty {
            VarType::Text => VarValue::Text(element),
            _ => VarValue::Float(parse_number(&element)),
        };
        return assign(ctx, &key, value);
    }

    if flags.contains('i') {
        let var = ctx.get_word();
        let prefix = ctx.get_word();
        let Some(key) = target(ctx, &var) else {
            return CommandResult::Failed;
        };
        let count = ctx
            .this()
            .map_or(0, |e| e.inventory.iter().filter(|item| item.starts_with(prefix.as_str())).count());
        return assign(ctx, &key, VarValue::Int(count as i64));
    }

    let var = ctx.get_word();
    let value = ctx.get_word();
    let Some(key) = target(ctx, &var) else {
        return CommandResult::Failed;
    };
    let value = operand(ctx, &value, key.ty);
    assign(ctx, &key, value)
}

fn unset_command(ctx: &mut Context<'_>) -> CommandResult {
    let var = ctx.get_word();
    let Some(key) = target(ctx, &var) else {
        return CommandResult::Failed;
    };
    ctx.unset_var(&key);
    CommandResult::Success
}

fn arithmetic(ctx: &mut Context<'_>, op: Arith) -> CommandResult {
    let var = ctx.get_word();
    let raw = ctx.get_word();
    let Some(key) = target(ctx, &var) else {
        return CommandResult::Failed;
    };
    let value = operand(ctx, &raw, VarType::Float);
    update(ctx, &key, op, value)
}

fn step(ctx: &mut Context<'_>, delta: i64) -> CommandResult {
    let var = ctx.get_word();
    let Some(key) = target(ctx, &var) else {
        return CommandResult::Failed;
    };
    update(ctx, &key, Arith::Add, VarValue::Int(delta))
}

fn update(ctx: &mut Context<'_>, key: &VarKey, op: Arith, operand: VarValue) -> CommandResult {
    if key.ty == VarType::Text {
        ctx.warn(format!("{}: {} is not numeric", op.name(), key));
        return CommandResult::Failed;
    }

    let b = operand.as_float();
    let invalid = match op {
        Arith::Div | Arith::Mod | Arith::Root => b == 0.0,
        _ => false,
    };
    if invalid {
        ctx.warn(format!("{} {}: division by zero", op.name(), key));
        return CommandResult::Failed;
    }

    let current = ctx.read_key(key);
    let integral = b.fract() == 0.0 && b.abs() < i64::MAX as f64;
    let exact = match (key.ty, &current) {
        (VarType::Int, VarValue::Int(a)) if integral => op.apply_int(*a, b as i64),
        _ => None,
    };
    let result = match exact {
        Some(n) => VarValue::Int(n),
        None => VarValue::Float(op.apply_float(current.as_float(), b)),
    };
    assign(ctx, key, result)
}
