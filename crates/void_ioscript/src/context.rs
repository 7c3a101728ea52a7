//! Script cursor
//!
//! A [`Context`] is created for every dispatch. It walks the script text
//! lazily: commands pull exactly the arguments they need with the `get_*`
//! methods, so there is no token stream. Whitespace includes `(` and `)`.
//! `//` comments are skipped everywhere except inside quoted strings.

use std::fmt;
use std::sync::Arc;

use crate::command::CommandRegistry;
use crate::condition;
use crate::dispatch;
use crate::entity::{Entity, EntityId};
use crate::event::{EventName, ScriptParameters, ScriptResult};
use crate::format::format_value;
use crate::source::ScriptSource;
use crate::system_vars;
use crate::value::{is_system_var, parse_number, VarKey, VarScope, VarValue};
use crate::variables::VariableTable;
use crate::world::ScriptWorld;

/// Return point pushed by `gosub`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub return_pos: usize,
    pub label: String,
}

#[inline]
fn is_whitespace(b: u8) -> bool {
    b <= b' ' || b == b'(' || b == b')'
}

/// Cursor over one script for one dispatch
pub struct Context<'a> {
    registry: &'a CommandRegistry,
    world: &'a mut ScriptWorld,
    source: Arc<ScriptSource>,
    pos: usize,
    sender: Option<EntityId>,
    entity: EntityId,
    event: EventName,
    parameters: ScriptParameters,
    timer: Option<String>,
    stack: Vec<Frame>,
    peek: bool,
}

impl<'a> Context<'a> {
    pub fn new(
        registry: &'a CommandRegistry,
        world: &'a mut ScriptWorld,
        source: Arc<ScriptSource>,
        entity: EntityId,
        event: EventName,
    ) -> Self {
        Self {
            registry,
            world,
            source,
            pos: 0,
            sender: None,
            entity,
            event,
            parameters: ScriptParameters::new(),
            timer: None,
            stack: Vec::new(),
            peek: false,
        }
    }

    pub fn at(mut self, pos: usize) -> Self {
        self.pos = pos.min(self.source.len());
        self
    }

    pub fn from_sender(mut self, sender: Option<EntityId>) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_parameters(mut self, parameters: ScriptParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn in_timer(mut self, timer: Option<String>) -> Self {
        self.timer = timer;
        self
    }

    pub fn peeking(mut self, peek: bool) -> Self {
        self.peek = peek;
        self
    }

    // ---- accessors ----

    pub fn registry(&self) -> &'a CommandRegistry {
        self.registry
    }

    pub fn world(&self) -> &ScriptWorld {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut ScriptWorld {
        &mut *self.world
    }

    pub fn source(&self) -> &Arc<ScriptSource> {
        &self.source
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.source.len());
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn sender(&self) -> Option<EntityId> {
        self.sender
    }

    pub fn event(&self) -> &EventName {
        &self.event
    }

    pub fn parameters(&self) -> &ScriptParameters {
        &self.parameters
    }

    pub fn timer(&self) -> Option<&str> {
        self.timer.as_deref()
    }

    pub fn stack(&self) -> &[Frame] {
        &self.stack
    }

    pub fn is_peek(&self) -> bool {
        self.peek
    }

    /// The entity running the script, if it still exists
    pub fn this(&self) -> Option<&Entity> {
        self.world.entities.get(self.entity)
    }

    pub fn this_mut(&mut self) -> Option<&mut Entity> {
        self.world.entities.get_mut(self.entity)
    }

    pub fn ident(&self) -> String {
        self.this()
            .map(Entity::ident)
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Resolve an entity word (`self`, `player`, an ident)
    pub fn resolve_entity(&self, word: &str) -> Option<EntityId> {
        self.world.entities.resolve(word, self.entity)
    }

    // ---- diagnostics ----

    fn location(&self) -> String {
        let (line, column) = self.source.line_column(self.pos);
        let mut out = format!("[{}:{}:{}] {}", self.source.name(), line, column, self.ident());
        if let Some(timer) = &self.timer {
            out.push_str(&format!(" (timer {})", timer));
        }
        out
    }

    fn call_trace(&self) -> String {
        let mut out = String::new();
        for frame in self.stack.iter().rev() {
            let (line, column) = self.source.line_column(frame.return_pos);
            out.push_str(&format!("\n    from >>{} at {}:{}", frame.label, line, column));
        }
        out
    }

    pub fn warn(&self, message: impl fmt::Display) {
        log::warn!(target: "ioscript", "{}: {}{}", self.location(), message, self.call_trace());
    }

    pub fn error(&self, message: impl fmt::Display) {
        log::error!(target: "ioscript", "{}: {}{}", self.location(), message, self.call_trace());
    }

    pub fn debug(&self, message: impl fmt::Display) {
        log::debug!(target: "ioscript", "{}: {}", self.location(), message);
    }

    fn is_suppressed(&self, token: &str) -> bool {
        self.world
            .suppressions
            .is_suppressed(self.source.name(), self.pos, token)
    }

    /// Warning that known-broken content may silence
    pub fn warn_at(&self, token: &str, message: impl fmt::Display) {
        if self.is_suppressed(token) {
            self.debug(format!("suppressed: {}", message));
        } else {
            self.warn(message);
        }
    }

    /// Error that known-broken content may silence
    pub fn error_at(&self, token: &str, message: impl fmt::Display) {
        if self.is_suppressed(token) {
            self.debug(format!("suppressed: {}", message));
        } else {
            self.error(message);
        }
    }

    // ---- tokenizer ----

    fn byte(&self, pos: usize) -> Option<u8> {
        self.source.text().as_bytes().get(pos).copied()
    }

    fn skip_comment(&mut self) {
        let bytes = self.source.text().as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn at_comment(&self) -> bool {
        self.byte(self.pos) == Some(b'/') && self.byte(self.pos + 1) == Some(b'/')
    }

    /// Skip whitespace and comments
    ///
    /// Stops at a newline unless `skip_newlines` is set. With `warn_newlines`
    /// crossing a newline is reported.
    pub fn skip_whitespace(&mut self, skip_newlines: bool, warn_newlines: bool) {
        let source = self.source.clone();
        let bytes = source.text().as_bytes();
        let mut warned = false;
        loop {
            while self.pos < bytes.len() && is_whitespace(bytes[self.pos]) {
                if bytes[self.pos] == b'\n' {
                    if !skip_newlines {
                        return;
                    }
                    if warn_newlines && !warned {
                        self.warn("unexpected newline");
                        warned = true;
                    }
                }
                self.pos += 1;
            }
            if self.at_comment() {
                self.skip_comment();
                continue;
            }
            break;
        }
    }

    /// Whether anything but whitespace is left on the current line
    pub fn has_more_on_line(&mut self) -> bool {
        self.skip_whitespace(false, false);
        !matches!(self.byte(self.pos), None | Some(b'\n'))
    }

    /// Read a command word
    pub fn get_command(&mut self, skip_newlines: bool) -> String {
        self.skip_whitespace(skip_newlines, false);
        let source = self.source.clone();
        let text = source.text();
        let bytes = text.as_bytes();

        let start = self.pos;
        let mut word = String::new();
        let mut run = start;
        while self.pos < bytes.len() && !is_whitespace(bytes[self.pos]) {
            let b = bytes[self.pos];
            if b == b'"' || b == b'~' {
                word.push_str(&text[run..self.pos]);
                self.warn(format!("unexpected '{}' in command name", b as char));
                self.pos += 1;
                run = self.pos;
                continue;
            }
            if b == b'/' && self.byte(self.pos + 1) == Some(b'/') {
                break;
            }
            self.pos += 1;
        }
        word.push_str(&text[run..self.pos]);
        word
    }

    /// Read one word without interpolating variables
    pub fn get_word_raw(&mut self) -> String {
        self.skip_whitespace(true, true);
        let source = self.source.clone();
        let text = source.text();
        let bytes = text.as_bytes();

        if self.pos >= bytes.len() {
            return String::new();
        }

        if bytes[self.pos] == b'"' {
            self.pos += 1;
            let start = self.pos;
            while self.pos < bytes.len() && bytes[self.pos] != b'"' {
                if bytes[self.pos] == b'\n' {
                    self.warn("missing closing quote");
                    return text[start..self.pos].to_string();
                }
                self.pos += 1;
            }
            let word = text[start..self.pos].to_string();
            if self.pos < bytes.len() {
                self.pos += 1;
            } else {
                self.warn("missing closing quote");
            }
            return word;
        }

        let mut word = String::new();
        let mut run = self.pos;
        while self.pos < bytes.len() && !is_whitespace(bytes[self.pos]) {
            if bytes[self.pos] == b'"' {
                word.push_str(&text[run..self.pos]);
                self.warn("unexpected '\"' in word");
                self.pos += 1;
                run = self.pos;
                continue;
            }
            if self.at_comment() {
                break;
            }
            self.pos += 1;
        }
        word.push_str(&text[run..self.pos]);
        word
    }

    /// Read one word, substituting `~var~` references
    pub fn get_word(&mut self) -> String {
        let raw = self.get_word_raw();
        self.expand(&raw)
    }

    /// Read one word, interpolating only when `evaluate` is set
    pub fn get_word_with(&mut self, evaluate: bool) -> String {
        if evaluate {
            self.get_word()
        } else {
            self.get_word_raw()
        }
    }

    pub fn skip_word(&mut self) {
        self.get_word_raw();
    }

    /// Skip to the end of the line
    ///
    /// Returns where the skipped part began, or `None` when nothing was left
    /// on the line.
    pub fn skip_command(&mut self) -> Option<usize> {
        if !self.has_more_on_line() {
            return None;
        }
        let start = self.pos;
        self.skip_comment();
        Some(start)
    }

    /// Read `-xyz` style flags; empty when the next word is no flag set
    pub fn get_flags(&mut self) -> String {
        self.skip_whitespace(false, false);
        let is_flag = self.byte(self.pos) == Some(b'-')
            && self
                .byte(self.pos + 1)
                .map_or(false, |b| b.is_ascii_alphabetic());
        if !is_flag {
            return String::new();
        }
        let word = self.get_word_raw();
        word[1..].to_string()
    }

    pub fn get_float(&mut self) -> f64 {
        let word = self.get_word();
        self.get_float_var(&word)
    }

    pub fn get_bool(&mut self) -> bool {
        matches!(self.get_word().as_str(), "on" | "yes" | "true" | "1")
    }

    /// Next command word without moving the cursor
    pub fn peek_command(&mut self) -> String {
        let saved = self.pos;
        let word = self.get_command(true);
        self.pos = saved;
        word
    }

    /// Consume the next command word if it equals `word`
    pub fn consume_command(&mut self, word: &str) -> bool {
        let saved = self.pos;
        if self.get_command(true) == word {
            true
        } else {
            self.pos = saved;
            false
        }
    }

    // ---- variables ----

    /// Substitute `~var~` and `~%fmt,var~` references in `raw`
    pub fn expand(&mut self, raw: &str) -> String {
        if !raw.contains('~') {
            return raw.to_string();
        }
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(open) = rest.find('~') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('~') else {
                self.warn("unmatched '~'");
                out.push_str(after);
                return out;
            };
            let inner = &after[..close];
            out.push_str(&self.interpolate(inner));
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }

    fn interpolate(&mut self, inner: &str) -> String {
        if inner.starts_with('%') {
            if let Some((spec, name)) = inner.split_once(',') {
                let value = self.get_var(name);
                return format_value(spec, &value);
            }
        }
        self.get_var(inner).as_text()
    }

    fn table(&self, scope: VarScope) -> Option<&VariableTable> {
        match scope {
            VarScope::Global => Some(&self.world.globals),
            VarScope::Local => self.this().map(|e| &e.locals),
        }
    }

    fn table_mut(&mut self, scope: VarScope) -> Option<&mut VariableTable> {
        match scope {
            VarScope::Global => Some(&mut self.world.globals),
            VarScope::Local => self.this_mut().map(|e| &mut e.locals),
        }
    }

    /// Value named by a token: system variable, stored variable or literal
    pub fn get_var(&mut self, token: &str) -> VarValue {
        if is_system_var(token) {
            return system_vars::resolve(self, token);
        }
        match VarKey::parse(token) {
            Some(key) => self.read_key(&key),
            None => VarValue::Text(token.to_string()),
        }
    }

    /// Stored value; unset variables read as zero and are not created
    pub fn read_key(&self, key: &VarKey) -> VarValue {
        self.table(key.scope)
            .map(|table| table.value(key.ty, &key.name))
            .unwrap_or_else(|| key.ty.zero())
    }

    pub fn get_string_var(&mut self, token: &str) -> String {
        self.get_var(token).as_text()
    }

    pub fn get_float_var(&mut self, token: &str) -> f64 {
        if is_system_var(token) || VarKey::parse(token).is_some() {
            self.get_var(token).as_float()
        } else {
            parse_number(token)
        }
    }

    pub fn get_int_var(&mut self, token: &str) -> i64 {
        self.get_float_var(token) as i64
    }

    /// Write a variable; false when the entity is gone
    pub fn set_var(&mut self, key: &VarKey, value: VarValue) -> bool {
        match self.table_mut(key.scope) {
            Some(table) => {
                table.set_key(key, value);
                true
            }
            None => false,
        }
    }

    pub fn unset_var(&mut self, key: &VarKey) -> bool {
        self.table_mut(key.scope)
            .and_then(|table| table.remove(key.ty, &key.name))
            .is_some()
    }

    // ---- control flow ----

    /// Move to a label; `gosub` also pushes the current position
    pub fn jump_to_label(&mut self, label: &str, gosub: bool) -> bool {
        let label = label.strip_prefix(">>").unwrap_or(label);
        let Some(target) = self.source.label(label) else {
            return false;
        };
        if gosub {
            self.stack.push(Frame {
                return_pos: self.pos,
                label: label.to_string(),
            });
        }
        self.pos = target;
        true
    }

    /// Pop the call stack and resume there
    pub fn return_to_caller(&mut self) -> bool {
        match self.stack.pop() {
            Some(frame) => {
                self.pos = frame.return_pos;
                true
            }
            None => false,
        }
    }

    /// Skip the next statement
    ///
    /// A `{ ... }` block is skipped by brace counting. An `if` statement is
    /// skipped with its condition, its body and any `else` branch. Any
    /// other statement is skipped to the end of its line.
    pub fn skip_block(&mut self) {
        self.skip_whitespace(true, false);
        let source = self.source.clone();
        let bytes = source.text().as_bytes();

        if self.pos >= bytes.len() {
            self.warn("expected block, found end of script");
            return;
        }

        if bytes[self.pos] != b'{' {
            let saved = self.pos;
            let word = self.get_command(true);
            if word == "if" {
                condition::skip(self);
                self.skip_block();
                if self.consume_command("else") {
                    self.skip_block();
                }
            } else {
                self.pos = saved;
                self.skip_comment();
            }
            return;
        }

        self.pos += 1;
        let mut depth = 1usize;
        while depth > 0 {
            if self.pos >= bytes.len() {
                self.warn("missing '}' before end of script");
                return;
            }
            match bytes[self.pos] {
                b'"' => {
                    self.pos += 1;
                    while self.pos < bytes.len() && bytes[self.pos] != b'"' && bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if self.byte(self.pos + 1) == Some(b'/') => {
                    self.skip_comment();
                    continue;
                }
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }
    }

    // ---- events ----

    /// Send an event right away, nested inside this dispatch
    pub fn send_event(
        &mut self,
        target: EntityId,
        event: &EventName,
        parameters: &ScriptParameters,
    ) -> ScriptResult {
        dispatch::send_event(
            self.registry,
            &mut *self.world,
            Some(self.entity),
            target,
            event,
            parameters,
        )
    }
}
