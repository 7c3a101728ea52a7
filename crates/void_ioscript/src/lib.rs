//! # Void IOScript
//!
//! Event-driven entity scripts for Void Engine:
//! - Line-oriented command scripts, one `on <event> { ... }` block per event
//! - Typed global and per-entity variables named by sigil
//! - Conditions with `and`/`or`/`not`, labels with `goto`/`gosub`/`return`
//! - Timers that resume a script line later
//! - A bounded event queue for broadcasts
//! - Suppression tables that silence known-broken content
//!
//! ## Script Overview
//!
//! ```text
//! on init {
//!   set §visits 0
//!   setgroup guards
//!   accept
//! }
//!
//! on hit {
//!   inc §visits 1
//!   if (§visits >= 3) {
//!     sendevent -g guards alarm "~^me~"
//!     timerwarn -m 1 500 speak "you will regret that"
//!   }
//!   gosub flee
//!   accept
//! }
//!
//! >>flee
//!   behavior flee
//!   return
//! ```
//!
//! ## Embedding
//!
//! ```ignore
//! use void_ioscript::{Entity, EntityFlags, ScriptConfig, ScriptEngine, ScriptMessage, ScriptSource};
//!
//! let mut engine = ScriptEngine::new(ScriptConfig::default())?;
//! let guard = engine.spawn(
//!     Entity::new("guard", EntityFlags::NPC).with_script(ScriptSource::load("scripts/guard.asl")?),
//! );
//! engine.init_entity(guard)?;
//! engine.send(guard, ScriptMessage::Hit)?;
//! engine.tick(std::time::Duration::from_millis(16));
//! ```

pub mod command;
pub mod commands;
pub mod condition;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod entity;
pub mod event;
pub mod format;
pub mod host;
pub mod queue;
pub mod source;
pub mod suppress;
pub mod system_vars;
pub mod timer;
pub mod value;
pub mod variables;
pub mod world;

pub use command::{Command, CommandRegistry, CommandResult, NativeCommand};
pub use config::ScriptConfig;
pub use context::Context;
pub use engine::ScriptEngine;
pub use entity::{Entity, EntityFlags, EntityId, EntityTable};
pub use event::{EventName, ScriptMessage, ScriptParameters, ScriptResult};
pub use host::{HostCommand, HostResponse, NullHost, RecordingHost, ScriptHost};
pub use queue::{EventQueue, QueuedEvent};
pub use source::ScriptSource;
pub use suppress::{Suppression, SuppressionTable};
pub use timer::{ScriptTimer, TimerSet};
pub use value::{VarKey, VarScope, VarType, VarValue};
pub use variables::VariableTable;
pub use world::ScriptWorld;

use thiserror::Error;

/// IOScript errors
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Command already registered: {0}")]
    DuplicateCommand(String),

    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("Invalid variable name: {0}")]
    InvalidVariable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}
