//! Variable names and values
//!
//! Script text names a variable with a leading sigil that encodes both its
//! scope and its type. The sigil is only interpreted here, at the parsing
//! boundary; everything past this module works with [`VarKey`].
//!
//! | sigil | scope  | type  |
//! |-------|--------|-------|
//! | `$`   | global | text  |
//! | `#`   | global | int   |
//! | `&`   | global | float |
//! | `£`   | local  | text  |
//! | `§`   | local  | int   |
//! | `@`   | local  | float |
//!
//! `^` prefixes read-only system variables, which are resolved by
//! [`crate::system_vars`] and never stored.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of read-only system variables
pub const SYSTEM_SIGIL: char = '^';

/// Where a variable lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VarScope {
    /// Shared by every entity for the whole session
    Global,
    /// Owned by one entity
    Local,
}

/// Type of a stored variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VarType {
    Text,
    Int,
    Float,
}

impl VarType {
    /// Zero value of this type
    pub fn zero(self) -> VarValue {
        match self {
            Self::Text => VarValue::Text(String::new()),
            Self::Int => VarValue::Int(0),
            Self::Float => VarValue::Float(0.0),
        }
    }
}

/// Structured variable name: scope, type and the bare name without sigil
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarKey {
    pub scope: VarScope,
    pub ty: VarType,
    pub name: String,
}

impl VarKey {
    pub fn new(scope: VarScope, ty: VarType, name: impl Into<String>) -> Self {
        Self {
            scope,
            ty,
            name: name.into(),
        }
    }

    /// Parse a sigil-prefixed script name (`#foo`, `§bar`, ...)
    ///
    /// Returns `None` for system variables, literals and empty names.
    pub fn parse(token: &str) -> Option<Self> {
        let mut chars = token.chars();
        let sigil = chars.next()?;
        let (scope, ty) = sigil_kind(sigil)?;
        let name = chars.as_str();
        if name.is_empty() {
            return None;
        }
        Some(Self::new(scope, ty, name))
    }

    /// Sigil character used in script text for this key
    pub fn sigil(&self) -> char {
        match (self.scope, self.ty) {
            (VarScope::Global, VarType::Text) => '$',
            (VarScope::Global, VarType::Int) => '#',
            (VarScope::Global, VarType::Float) => '&',
            (VarScope::Local, VarType::Text) => '£',
            (VarScope::Local, VarType::Int) => '§',
            (VarScope::Local, VarType::Float) => '@',
        }
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.sigil(), self.name)
    }
}

/// Scope and type encoded by a sigil, if it is one
pub fn sigil_kind(sigil: char) -> Option<(VarScope, VarType)> {
    match sigil {
        '$' => Some((VarScope::Global, VarType::Text)),
        '#' => Some((VarScope::Global, VarType::Int)),
        '&' => Some((VarScope::Global, VarType::Float)),
        '£' => Some((VarScope::Local, VarType::Text)),
        '§' => Some((VarScope::Local, VarType::Int)),
        '@' => Some((VarScope::Local, VarType::Float)),
        _ => None,
    }
}

/// Whether a token names a system variable
pub fn is_system_var(token: &str) -> bool {
    token.starts_with(SYSTEM_SIGIL)
}

/// Value of a script variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl VarValue {
    pub fn ty(&self) -> VarType {
        match self {
            Self::Text(_) => VarType::Text,
            Self::Int(_) => VarType::Int,
            Self::Float(_) => VarType::Float,
        }
    }

    /// Numeric view; text is parsed with [`parse_number`]
    pub fn as_float(&self) -> f64 {
        match self {
            Self::Text(s) => parse_number(s),
            Self::Int(n) => *n as f64,
            Self::Float(f) => *f,
        }
    }

    /// Integer view; floats truncate toward zero
    pub fn as_int(&self) -> i64 {
        match self {
            Self::Text(s) => parse_number(s) as i64,
            Self::Int(n) => *n,
            Self::Float(f) => *f as i64,
        }
    }

    /// Text view as it would be interpolated into a string
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => format_float(*f),
        }
    }

    /// Convert to the given type
    pub fn coerce(self, ty: VarType) -> VarValue {
        match (ty, self) {
            (VarType::Text, Self::Text(s)) => Self::Text(s),
            (VarType::Int, Self::Int(n)) => Self::Int(n),
            (VarType::Float, Self::Float(f)) => Self::Float(f),
            (VarType::Text, other) => Self::Text(other.as_text()),
            (VarType::Int, other) => Self::Int(other.as_int()),
            (VarType::Float, other) => Self::Float(other.as_float()),
        }
    }
}

impl fmt::Display for VarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Shortest text form of a float (`2` for 2.0, `1.5` for 1.5)
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Parse the longest numeric prefix of `text`, C `atof` style
///
/// Leading whitespace is skipped; text without a numeric prefix is `0`.
pub fn parse_number(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || (end == digits_start + 1 && bytes[digits_start] == b'.') {
        return 0.0;
    }
    // Optional exponent, only when it is complete
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}

/// Whether the whole token is a number
pub fn is_number(text: &str) -> bool {
    !text.is_empty() && text.parse::<f64>().is_ok()
}
