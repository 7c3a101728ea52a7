//! Session state shared by every dispatch

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ScriptConfig;
use crate::entity::{EntityId, EntityTable};
use crate::host::{NullHost, ScriptHost};
use crate::queue::EventQueue;
use crate::suppress::SuppressionTable;
use crate::timer::TimerSet;
use crate::variables::VariableTable;

/// Everything a script can observe or change
pub struct ScriptWorld {
    pub(crate) config: ScriptConfig,
    pub(crate) globals: VariableTable,
    pub(crate) entities: EntityTable,
    pub(crate) timers: TimerSet,
    pub(crate) queue: EventQueue,
    pub(crate) suppressions: SuppressionTable,
    /// Game time since the session started
    pub(crate) clock: Duration,
    pub(crate) rng: StdRng,
    pub(crate) host: Box<dyn ScriptHost>,
    /// Next slot visited by the heartbeat
    pub(crate) heartbeat_cursor: usize,
    /// Current nesting of dispatches
    pub(crate) depth: usize,
}

impl ScriptWorld {
    pub fn new(config: ScriptConfig) -> Self {
        Self::with_host(config, Box::new(NullHost))
    }

    pub fn with_host(config: ScriptConfig, host: Box<dyn ScriptHost>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            queue: EventQueue::new(config.event_queue_capacity),
            config,
            globals: VariableTable::new(),
            entities: EntityTable::new(),
            timers: TimerSet::new(),
            suppressions: SuppressionTable::new(),
            clock: Duration::ZERO,
            rng,
            host,
            heartbeat_cursor: 0,
            depth: 0,
        }
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn globals(&self) -> &VariableTable {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut VariableTable {
        &mut self.globals
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityTable {
        &mut self.entities
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn suppressions(&self) -> &SuppressionTable {
        &self.suppressions
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn host_mut(&mut self) -> &mut dyn ScriptHost {
        self.host.as_mut()
    }

    /// Remove an entity with its timers and queued events
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.entities.remove(id) else {
            return false;
        };
        let timers = self.timers.clear_for(id);
        self.queue.clear_for(id);
        log::debug!(
            target: "ioscript",
            "destroyed {} ({} timers cleared)",
            entity.ident(),
            timers
        );
        self.host.entity_destroyed(id);
        true
    }

    /// Uniform draw in `[0, max)`
    pub fn random(&mut self, max: f64) -> f64 {
        if max <= 0.0 {
            return 0.0;
        }
        self.rng.gen_range(0.0..max)
    }
}
