//! Scene files - entities, their scripts and a timeline of events
//!
//! ```toml
//! [engine]
//! rng_seed = 7
//!
//! [globals]
//! "#difficulty" = 2
//!
//! [[entity]]
//! class = "guard"
//! script = "scripts/guard.asl"
//! flags = ["npc"]
//! groups = ["guards"]
//!
//! [[event]]
//! tick = 3
//! target = "guard_0001"
//! name = "hit"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use void_ioscript::{
    Entity, EntityFlags, EntityId, ScriptConfig, ScriptEngine, ScriptError, ScriptParameters,
    ScriptSource, VarValue,
};

/// Runner errors
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Unknown entity flag '{flag}' on {class}")]
    UnknownFlag { class: String, flag: String },

    #[error("Entity {0} has both a script file and inline source")]
    AmbiguousScript(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Root scene definition loaded from scene.toml
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SceneDefinition {
    /// Interpreter settings
    #[serde(default)]
    pub engine: ScriptConfig,

    /// Global variables set before any script runs
    #[serde(default)]
    pub globals: BTreeMap<String, VarValue>,

    /// Entities, spawned in order
    #[serde(default, rename = "entity")]
    pub entities: Vec<EntityDef>,

    /// Events delivered at fixed ticks
    #[serde(default, rename = "event")]
    pub events: Vec<EventDef>,
}

/// One entity of the scene
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EntityDef {
    pub class: String,

    /// Class script file, relative to the scene file
    #[serde(default)]
    pub script: Option<PathBuf>,

    /// Inline class script text
    #[serde(default)]
    pub source: Option<String>,

    /// Per-instance override script file
    #[serde(default, rename = "override")]
    pub override_script: Option<PathBuf>,

    /// Capability names: npc, item, fix, camera, marker
    #[serde(default)]
    pub flags: Vec<String>,

    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub types: Vec<String>,

    #[serde(default)]
    pub items: Vec<String>,

    #[serde(default)]
    pub position: [f64; 3],

    #[serde(default = "default_active_zone")]
    pub active_zone: bool,
}

fn default_active_zone() -> bool {
    true
}

/// An event sent from outside the scripts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventDef {
    /// Delivered before this tick runs; tick 0 follows the init pass
    #[serde(default)]
    pub tick: u32,

    /// Target entity ident
    pub target: String,

    /// Event name, with or without the `on ` prefix
    pub name: String,

    /// Space separated parameters
    #[serde(default)]
    pub params: String,

    /// Sender entity ident
    #[serde(default)]
    pub sender: Option<String>,

    /// Push onto the event queue instead of dispatching right away
    #[serde(default)]
    pub queued: bool,
}

/// Summary printed after a run
#[derive(Debug, Clone, Serialize)]
pub struct SceneReport {
    pub ticks: u32,
    pub clock_ms: u128,
    pub entities: usize,
    pub timers: usize,
    pub queued_events: usize,
    pub dropped_events: u64,
    pub globals: BTreeMap<String, VarValue>,
}

/// Load a scene definition from a TOML file
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<SceneDefinition, RunnerError> {
    let content = std::fs::read_to_string(path)?;
    let scene: SceneDefinition = toml::from_str(&content)?;
    Ok(scene)
}

/// Load a scene definition from a TOML string
pub fn load_scene_from_str(content: &str) -> Result<SceneDefinition, RunnerError> {
    let scene: SceneDefinition = toml::from_str(content)?;
    Ok(scene)
}

impl EntityDef {
    /// Parse the capability names
    pub fn entity_flags(&self) -> Result<EntityFlags, RunnerError> {
        self.flags.iter().try_fold(EntityFlags::empty(), |flags, name| {
            EntityFlags::from_name(&name.to_ascii_uppercase())
                .map(|flag| flags | flag)
                .ok_or_else(|| RunnerError::UnknownFlag {
                    class: self.class.clone(),
                    flag: name.clone(),
                })
        })
    }

    fn build(&self, base_dir: &Path) -> Result<Entity, RunnerError> {
        let mut entity = Entity::new(self.class.as_str(), self.entity_flags()?)
            .with_position(self.position)
            .with_active_zone(self.active_zone);

        match (&self.script, &self.source) {
            (Some(_), Some(_)) => return Err(RunnerError::AmbiguousScript(self.class.clone())),
            (Some(path), None) => entity = entity.with_script(ScriptSource::load(base_dir.join(path))?),
            (None, Some(text)) => entity = entity.with_script(ScriptSource::from_raw(self.class.as_str(), text)),
            (None, None) => {}
        }
        if let Some(path) = &self.override_script {
            entity = entity.with_override(ScriptSource::load(base_dir.join(path))?);
        }

        for group in &self.groups {
            entity = entity.with_group(group.as_str());
        }
        for ty in &self.types {
            entity = entity.with_type(ty.as_str());
        }
        for item in &self.items {
            entity = entity.with_item(item.as_str());
        }
        Ok(entity)
    }
}

/// A scene spawned into a running engine
pub struct LoadedScene {
    pub engine: ScriptEngine,
    pub entities: Vec<EntityId>,
    events: Vec<EventDef>,
    ticks: u32,
}

impl SceneDefinition {
    /// Build the engine and spawn every entity; paths resolve against `base_dir`
    pub fn instantiate(&self, base_dir: &Path) -> Result<LoadedScene, RunnerError> {
        let mut config = self.engine.clone();
        if let Some(path) = config.suppressions.take() {
            config = config.with_suppressions(base_dir.join(path));
        }
        let mut engine = ScriptEngine::new(config)?;

        for (name, value) in &self.globals {
            engine.set_global(name, value.clone())?;
        }

        let mut entities = Vec::with_capacity(self.entities.len());
        for def in &self.entities {
            let id = engine.spawn(def.build(base_dir)?);
            log::debug!("Spawned {} from class {}", id, def.class);
            entities.push(id);
        }

        let mut events = self.events.clone();
        events.sort_by_key(|event| event.tick);

        Ok(LoadedScene {
            engine,
            entities,
            events,
            ticks: 0,
        })
    }
}

impl LoadedScene {
    /// Send `init` and `initend` to every entity in spawn order
    pub fn init(&mut self) -> Result<(), RunnerError> {
        for &id in &self.entities {
            if self.engine.entity(id).is_some() {
                self.engine.init_entity(id)?;
            }
        }
        Ok(())
    }

    /// Run `ticks` frames of `dt`, delivering timeline events along the way
    pub fn run(&mut self, ticks: u32, dt: Duration) {
        for _ in 0..ticks {
            self.deliver(self.ticks);
            self.engine.tick(dt);
            self.ticks += 1;
        }
        self.deliver(self.ticks);
    }

    fn deliver(&mut self, tick: u32) {
        let due: Vec<EventDef> = self.events.iter().filter(|event| event.tick == tick).cloned().collect();
        for event in due {
            let Some(target) = self.engine.find(&event.target) else {
                log::warn!("Tick {}: no entity named {} for event {}", tick, event.target, event.name);
                continue;
            };
            let sender = event.sender.as_deref().and_then(|ident| self.engine.find(ident));
            let parameters = ScriptParameters::parse(&event.params);

            if event.queued {
                if !self.engine.queue_event(sender, target, event.name.as_str(), parameters) {
                    log::warn!("Tick {}: event queue full, dropped {}", tick, event.name);
                }
                continue;
            }
            match self.engine.send_event(sender, target, event.name.as_str(), parameters) {
                Ok(result) => log::info!("Tick {}: {} -> {} = {:?}", tick, event.name, event.target, result),
                Err(e) => log::warn!("Tick {}: {}", tick, e),
            }
        }
    }

    pub fn report(&self) -> SceneReport {
        SceneReport {
            ticks: self.ticks,
            clock_ms: self.engine.clock().as_millis(),
            entities: self.engine.world().entities().len(),
            timers: self.engine.timers().len(),
            queued_events: self.engine.queue().len(),
            dropped_events: self.engine.queue().dropped(),
            globals: self.engine.globals_snapshot(),
        }
    }
}
