//! `if` conditions
//!
//! ```text
//! condition  := '('* (connective | comparison) ')'*
//! connective := ('and' | 'or') '(' condition (sep condition)* ')'
//!             | 'not' '(' condition ')'
//! sep        := ',' | '&&' | '||'
//! comparison := operand op operand
//! ```
//!
//! Evaluation short-circuits: once an `and` has a false child or an `or` a
//! true one, the remaining children are still read so the cursor ends up
//! in the same place, but no operand is resolved.

use crate::context::Context;
use crate::value::{is_number, is_system_var, parse_number, sigil_kind, VarType, VarValue};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Separator,
    Word(String),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsClass,
    IsGroup,
    NotIsGroup,
    IsType,
    IsIn,
    IsElement,
}

impl Op {
    fn parse(word: &str) -> Option<Self> {
        Some(match word {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "isclass" => Self::IsClass,
            "isgroup" => Self::IsGroup,
            "!isgroup" => Self::NotIsGroup,
            "istype" => Self::IsType,
            "isin" => Self::IsIn,
            "iselement" => Self::IsElement,
            _ => return None,
        })
    }

    fn is_numeric(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Number(f64),
    Text(String),
}

/// How an operand token will resolve, before resolving it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Number,
    Text,
    System,
    Literal,
}

fn classify(raw: &str) -> Kind {
    if is_system_var(raw) {
        return Kind::System;
    }
    match raw.chars().next().and_then(sigil_kind) {
        Some((_, VarType::Text)) if raw.chars().count() > 1 => Kind::Text,
        Some((_, _)) if raw.chars().count() > 1 => Kind::Number,
        _ => Kind::Literal,
    }
}

/// Evaluate the condition at the cursor
///
/// `None` means the condition could not be evaluated; the problem has been
/// reported and the cursor sits before the `if` body.
pub fn evaluate(ctx: &mut Context<'_>) -> Option<bool> {
    let mut parser = Parser::new(ctx);
    let value = parser.item(true);
    parser.finish().then_some(value)
}

/// Read past the condition at the cursor without evaluating it
pub fn skip(ctx: &mut Context<'_>) {
    let mut parser = Parser::new(ctx);
    parser.item(false);
    parser.finish();
}

struct Parser<'c, 'a> {
    ctx: &'c mut Context<'a>,
    failed: bool,
    broken: bool,
}

impl<'c, 'a> Parser<'c, 'a> {
    fn new(ctx: &'c mut Context<'a>) -> Self {
        Self {
            ctx,
            failed: false,
            broken: false,
        }
    }

    /// True when the condition was usable
    fn finish(&mut self) -> bool {
        !(self.failed || self.broken)
    }

    // ---- tokens ----

    fn next(&mut self) -> Token {
        let source = self.ctx.source().clone();
        let text = source.text();
        let bytes = text.as_bytes();
        let mut pos = self.ctx.position();

        loop {
            while pos < bytes.len() && matches!(bytes[pos], b' ' | b'\t' | b'\r') {
                pos += 1;
            }
            if bytes.get(pos) == Some(&b'/') && bytes.get(pos + 1) == Some(&b'/') {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
                continue;
            }
            break;
        }

        let token = match bytes.get(pos) {
            None | Some(b'\n') | Some(b'{') => Token::End,
            Some(b'(') => {
                pos += 1;
                Token::Open
            }
            Some(b')') => {
                pos += 1;
                Token::Close
            }
            Some(b',') => {
                pos += 1;
                Token::Separator
            }
            Some(b'"') => {
                let start = pos + 1;
                pos = start;
                while pos < bytes.len() && bytes[pos] != b'"' && bytes[pos] != b'\n' {
                    pos += 1;
                }
                let word = text[start..pos].to_string();
                if bytes.get(pos) == Some(&b'"') {
                    pos += 1;
                } else {
                    self.ctx.warn("missing closing quote");
                }
                Token::Word(word)
            }
            Some(_) => {
                let start = pos;
                while pos < bytes.len()
                    && bytes[pos] > b' '
                    && !matches!(bytes[pos], b'(' | b')' | b',' | b'{')
                {
                    pos += 1;
                }
                match &text[start..pos] {
                    "&&" | "||" => Token::Separator,
                    word => Token::Word(word.to_string()),
                }
            }
        };

        self.ctx.set_position(pos);
        token
    }

    fn peek(&mut self) -> Token {
        let saved = self.ctx.position();
        let token = self.next();
        self.ctx.set_position(saved);
        token
    }

    fn peek_connective(&mut self) -> Option<Connective> {
        let saved = self.ctx.position();
        let connective = match self.next() {
            Token::Word(word) => match word.as_str() {
                "and" => Some(Connective::And),
                "or" => Some(Connective::Or),
                "not" => Some(Connective::Not),
                _ => None,
            },
            _ => None,
        };
        let opens = connective.is_some() && self.next() == Token::Open;
        self.ctx.set_position(saved);
        connective.filter(|_| opens)
    }

    /// Report a grammar error and move to the `if` body
    fn grammar_error(&mut self, message: &str) {
        if self.broken {
            return;
        }
        self.broken = true;
        self.ctx.warn(format!("invalid condition: {}", message));

        let source = self.ctx.source().clone();
        let bytes = source.text().as_bytes();
        let mut pos = self.ctx.position();
        while pos < bytes.len() && bytes[pos] != b'{' && bytes[pos] != b'\n' {
            pos += 1;
        }
        self.ctx.set_position(pos);
    }

    // ---- grammar ----

    fn item(&mut self, live: bool) -> bool {
        if self.broken {
            return false;
        }

        let mut parens = 0;
        while self.peek() == Token::Open {
            self.next();
            parens += 1;
        }

        let value = match self.peek_connective() {
            Some(connective) => {
                self.next();
                self.next();
                self.connective(connective, live)
            }
            None => self.comparison(live),
        };

        for _ in 0..parens {
            if self.broken {
                break;
            }
            if self.next() != Token::Close {
                self.grammar_error("expected ')'");
            }
        }
        value
    }

    fn connective(&mut self, connective: Connective, live: bool) -> bool {
        if connective == Connective::Not {
            let value = self.item(live);
            if !self.broken && self.next() != Token::Close {
                self.grammar_error("'not' takes exactly one condition");
            }
            return !value;
        }

        let is_and = connective == Connective::And;
        let mut value = is_and;
        loop {
            let decided = if is_and { !value } else { value };
            let child_live = live && !decided;
            let child = self.item(child_live);
            if child_live {
                value = child;
            }
            if self.broken {
                return false;
            }
            match self.next() {
                Token::Separator => continue,
                Token::Close => break,
                _ => {
                    self.grammar_error("expected ',' or ')'");
                    return false;
                }
            }
        }
        value
    }

    fn operand(&mut self) -> Option<String> {
        match self.next() {
            Token::Word(word) => Some(word),
            _ => {
                self.grammar_error("expected operand");
                None
            }
        }
    }

    fn comparison(&mut self, live: bool) -> bool {
        let Some(left) = self.operand() else {
            return false;
        };
        let (op, op_word) = match self.next() {
            Token::Word(word) => match Op::parse(&word) {
                Some(op) => (op, word),
                None => {
                    self.grammar_error(&format!("unknown operator '{}'", word));
                    return false;
                }
            },
            _ => {
                self.grammar_error("expected operator");
                return false;
            }
        };
        let Some(right) = self.operand() else {
            return false;
        };

        if !live {
            return false;
        }
        match self.compare(&left, op, &right) {
            Some(value) => value,
            None => {
                self.failed = true;
                self.ctx
                    .warn(format!("type mismatch in '{} {} {}'", left, op_word, right));
                false
            }
        }
    }

    // ---- evaluation ----

    fn resolve(&mut self, raw: &str, kind: Kind, literal_as: Kind) -> Operand {
        match kind {
            Kind::System | Kind::Number | Kind::Text => match self.ctx.get_var(raw) {
                VarValue::Text(text) => Operand::Text(text),
                value => Operand::Number(value.as_float()),
            },
            Kind::Literal => {
                let text = self.ctx.expand(raw);
                match literal_as {
                    Kind::Number => Operand::Number(parse_number(&text)),
                    _ => Operand::Text(text),
                }
            }
        }
    }

    fn compare(&mut self, left: &str, op: Op, right: &str) -> Option<bool> {
        let left_kind = classify(left);
        let right_kind = classify(right);

        let (a, b) = if op.is_numeric() {
            (
                self.resolve(left, left_kind, Kind::Number),
                self.resolve(right, right_kind, Kind::Number),
            )
        } else if op.is_equality() {
            let a = match left_kind {
                Kind::Literal => None,
                kind => Some(self.resolve(left, kind, kind)),
            };
            let b = match right_kind {
                Kind::Literal => None,
                kind => Some(self.resolve(right, kind, kind)),
            };
            match (a, b) {
                (Some(a), Some(b)) => (a, b),
                (Some(a), None) => {
                    let as_kind = operand_kind(&a);
                    let b = self.resolve(right, Kind::Literal, as_kind);
                    (a, b)
                }
                (None, Some(b)) => {
                    let as_kind = operand_kind(&b);
                    (self.resolve(left, Kind::Literal, as_kind), b)
                }
                (None, None) => {
                    let l = self.ctx.expand(left);
                    let r = self.ctx.expand(right);
                    if is_number(&l) && is_number(&r) {
                        (Operand::Number(parse_number(&l)), Operand::Number(parse_number(&r)))
                    } else {
                        (Operand::Text(l), Operand::Text(r))
                    }
                }
            }
        } else {
            (
                self.resolve(left, left_kind, Kind::Text),
                self.resolve(right, right_kind, Kind::Text),
            )
        };

        match (op, a, b) {
            (Op::Eq, Operand::Number(a), Operand::Number(b)) => Some(a == b),
            (Op::Ne, Operand::Number(a), Operand::Number(b)) => Some(a != b),
            (Op::Lt, Operand::Number(a), Operand::Number(b)) => Some(a < b),
            (Op::Le, Operand::Number(a), Operand::Number(b)) => Some(a <= b),
            (Op::Gt, Operand::Number(a), Operand::Number(b)) => Some(a > b),
            (Op::Ge, Operand::Number(a), Operand::Number(b)) => Some(a >= b),
            (Op::Eq, Operand::Text(a), Operand::Text(b)) => Some(a == b),
            (Op::Ne, Operand::Text(a), Operand::Text(b)) => Some(a != b),
            (Op::IsClass, Operand::Text(a), Operand::Text(b)) => {
                Some(a.contains(b.as_str()) || b.contains(a.as_str()))
            }
            (Op::IsGroup, Operand::Text(a), Operand::Text(b)) => Some(self.in_group(&a, &b)),
            (Op::NotIsGroup, Operand::Text(a), Operand::Text(b)) => Some(!self.in_group(&a, &b)),
            (Op::IsType, Operand::Text(a), Operand::Text(b)) => Some(self.has_type(&a, &b)),
            (Op::IsIn, Operand::Text(a), Operand::Text(b)) => Some(b.contains(a.as_str())),
            (Op::IsElement, Operand::Text(a), Operand::Text(b)) => {
                Some(b.split_whitespace().any(|word| word == a))
            }
            _ => None,
        }
    }

    fn in_group(&self, entity: &str, group: &str) -> bool {
        self.ctx
            .resolve_entity(entity)
            .and_then(|id| self.ctx.world().entities().get(id))
            .map_or(false, |e| e.groups.contains(group))
    }

    fn has_type(&self, entity: &str, ty: &str) -> bool {
        self.ctx
            .resolve_entity(entity)
            .and_then(|id| self.ctx.world().entities().get(id))
            .map_or(false, |e| e.types.contains(ty))
    }
}

fn operand_kind(operand: &Operand) -> Kind {
    match operand {
        Operand::Number(_) => Kind::Number,
        Operand::Text(_) => Kind::Text,
    }
}
