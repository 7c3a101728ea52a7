//! Command trait and registry

use std::collections::HashMap;
use std::fmt;

use crate::context::Context;
use crate::entity::EntityFlags;
use crate::ScriptError;

/// What a command asks the dispatcher to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    /// Continue with the next command
    Success,
    /// Local failure, already reported; continue
    Failed,
    AbortAccept,
    AbortRefuse,
    AbortError,
    AbortDestructive,
    /// The cursor was moved to a label or return point
    Jumped,
}

/// A named script command
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    /// Capabilities the target entity must have (empty = any entity)
    fn required(&self) -> EntityFlags {
        EntityFlags::empty()
    }

    fn execute(&self, context: &mut Context<'_>) -> CommandResult;

    /// Dry run; commands with side effects refuse
    fn peek(&self, _context: &mut Context<'_>) -> CommandResult {
        CommandResult::AbortRefuse
    }
}

type CommandFn = dyn Fn(&mut Context<'_>) -> CommandResult + Send + Sync;

/// Command backed by a function
pub struct NativeCommand {
    name: String,
    required: EntityFlags,
    pure: bool,
    func: Box<CommandFn>,
}

impl NativeCommand {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> CommandResult + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            required: EntityFlags::empty(),
            pure: false,
            func: Box::new(func),
        }
    }

    /// Restrict the command to entities with `flags`
    pub fn requiring(mut self, flags: EntityFlags) -> Self {
        self.required = flags;
        self
    }

    /// Mark the command free of side effects so peeks run it
    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }
}

impl Command for NativeCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn required(&self) -> EntityFlags {
        self.required
    }

    fn execute(&self, context: &mut Context<'_>) -> CommandResult {
        (self.func)(context)
    }

    fn peek(&self, context: &mut Context<'_>) -> CommandResult {
        if self.pure {
            (self.func)(context)
        } else {
            CommandResult::AbortRefuse
        }
    }
}

impl fmt::Debug for NativeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCommand")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("pure", &self.pure)
            .finish()
    }
}

/// Name to command table, filled once at startup
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in command
    pub fn with_builtins() -> Result<Self, ScriptError> {
        let mut registry = Self::new();
        crate::commands::register_all(&mut registry)?;
        log::debug!(
            target: "ioscript::registry",
            "registered {} commands",
            registry.len()
        );
        Ok(registry)
    }

    /// Add a command; names are unique
    pub fn register(&mut self, command: Box<dyn Command>) -> Result<(), ScriptError> {
        let name = normalize_name(command.name());
        if self.commands.contains_key(&name) {
            return Err(ScriptError::DuplicateCommand(name));
        }
        log::trace!(target: "ioscript::registry", "register {}", name);
        self.commands.insert(name, command);
        Ok(())
    }

    /// Register a function command
    pub fn register_fn<F>(&mut self, name: &str, func: F) -> Result<(), ScriptError>
    where
        F: Fn(&mut Context<'_>) -> CommandResult + Send + Sync + 'static,
    {
        self.register(Box::new(NativeCommand::new(name, func)))
    }

    /// Register a side-effect free function command
    pub fn register_pure<F>(&mut self, name: &str, func: F) -> Result<(), ScriptError>
    where
        F: Fn(&mut Context<'_>) -> CommandResult + Send + Sync + 'static,
    {
        self.register(Box::new(NativeCommand::new(name, func).pure()))
    }

    /// Look up a command word as written in script text
    pub fn get(&self, word: &str) -> Option<&dyn Command> {
        self.commands.get(&normalize_name(word)).map(|c| c.as_ref())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.get(word).is_some()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

/// Lowercase and drop underscores
pub fn normalize_name(word: &str) -> String {
    word.chars().filter(|c| *c != '_').flat_map(char::to_lowercase).collect()
}
