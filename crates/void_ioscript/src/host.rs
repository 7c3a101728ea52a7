//! Game collaborator interface
//!
//! Gameplay effects live outside the interpreter. Forwarded commands and
//! system variables the engine does not own are handed to a [`ScriptHost`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::entity::EntityId;
use crate::value::VarValue;

/// A gameplay command forwarded by a script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostCommand {
    pub entity: EntityId,
    /// Ident of the calling entity
    pub ident: String,
    pub name: String,
    /// Flag letters without the leading `-`
    pub flags: String,
    pub args: Vec<String>,
}

impl HostCommand {
    pub fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(flag)
    }
}

/// Outcome of a forwarded command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostResponse {
    Done,
    Failed,
    /// Done; the rest of the line runs once this much time has passed
    ResumeAfter(Duration),
}

/// External game state and effects
pub trait ScriptHost: Send {
    /// Answer a `^` system variable the engine does not resolve itself
    fn system_var(&mut self, _entity: EntityId, _name: &str) -> Option<VarValue> {
        None
    }

    /// Perform a forwarded gameplay command
    fn command(&mut self, _command: &HostCommand) -> HostResponse {
        HostResponse::Done
    }

    /// Called after an entity has been removed
    fn entity_destroyed(&mut self, _entity: EntityId) {}
}

/// Host that accepts everything and knows nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl ScriptHost for NullHost {}

/// Host that records forwarded commands and serves fixed system variables
///
/// Clones share the same state, so a test can keep one handle while the
/// engine owns the other.
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    commands: Arc<Mutex<Vec<HostCommand>>>,
    vars: Arc<Mutex<HashMap<String, VarValue>>>,
    responses: Arc<Mutex<HashMap<String, HostResponse>>>,
    destroyed: Arc<Mutex<Vec<EntityId>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a system variable (name includes the `^`)
    pub fn set_var(&self, name: &str, value: VarValue) {
        self.vars.lock().insert(name.to_string(), value);
    }

    /// Reply to every call of `command` with `response`
    pub fn respond(&self, command: &str, response: HostResponse) {
        self.responses.lock().insert(command.to_string(), response);
    }

    pub fn commands(&self) -> Vec<HostCommand> {
        self.commands.lock().clone()
    }

    pub fn commands_named(&self, name: &str) -> Vec<HostCommand> {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect()
    }

    /// How often the engine asked for system variable `name`
    pub fn queried(&self, name: &str) -> usize {
        self.queries.lock().iter().filter(|q| q.as_str() == name).count()
    }

    pub fn destroyed(&self) -> Vec<EntityId> {
        self.destroyed.lock().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }
}

impl ScriptHost for RecordingHost {
    fn system_var(&mut self, _entity: EntityId, name: &str) -> Option<VarValue> {
        self.queries.lock().push(name.to_string());
        self.vars.lock().get(name).cloned()
    }

    fn command(&mut self, command: &HostCommand) -> HostResponse {
        self.commands.lock().push(command.clone());
        self.responses
            .lock()
            .get(&command.name)
            .copied()
            .unwrap_or(HostResponse::Done)
    }

    fn entity_destroyed(&mut self, entity: EntityId) {
        self.destroyed.lock().push(entity);
    }
}
