//! Script session

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::command::CommandRegistry;
use crate::config::ScriptConfig;
use crate::dispatch;
use crate::entity::{Entity, EntityId};
use crate::event::{EventName, ScriptMessage, ScriptParameters, ScriptResult};
use crate::host::ScriptHost;
use crate::queue::{self, EventQueue, QueuedEvent};
use crate::source::ScriptSource;
use crate::suppress::SuppressionTable;
use crate::timer::{self, TimerSet};
use crate::value::{VarKey, VarScope, VarValue};
use crate::world::ScriptWorld;
use crate::ScriptError;

/// One running game session: the command registry plus all script state
pub struct ScriptEngine {
    registry: CommandRegistry,
    world: ScriptWorld,
}

impl ScriptEngine {
    /// Create an engine with the built-in commands and no host
    pub fn new(config: ScriptConfig) -> Result<Self, ScriptError> {
        Self::with_host(config, Box::new(crate::host::NullHost))
    }

    /// Create an engine that forwards gameplay commands to `host`
    pub fn with_host(config: ScriptConfig, host: Box<dyn ScriptHost>) -> Result<Self, ScriptError> {
        let registry = CommandRegistry::with_builtins()?;
        let suppressions = match &config.suppressions {
            Some(path) => SuppressionTable::load(path)?,
            None => SuppressionTable::new(),
        };

        let mut world = ScriptWorld::with_host(config, host);
        world.suppressions = suppressions;

        log::info!(
            target: "ioscript",
            "script engine ready: {} commands, {} suppressions, queue of {}",
            registry.len(),
            world.suppressions.len(),
            world.queue.capacity()
        );
        Ok(Self { registry, world })
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Registry for adding game-specific commands
    pub fn registry_mut(&mut self) -> &mut CommandRegistry {
        &mut self.registry
    }

    pub fn world(&self) -> &ScriptWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut ScriptWorld {
        &mut self.world
    }

    pub fn timers(&self) -> &TimerSet {
        &self.world.timers
    }

    pub fn queue(&self) -> &EventQueue {
        &self.world.queue
    }

    pub fn clock(&self) -> Duration {
        self.world.clock
    }

    // ---- entities ----

    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        self.world.entities.spawn(entity)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.world.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.world.entities.get_mut(id)
    }

    pub fn find(&self, ident: &str) -> Option<EntityId> {
        self.world.entities.find(ident)
    }

    /// Remove an entity along with its timers and queued events
    pub fn destroy(&mut self, id: EntityId) -> Result<(), ScriptError> {
        if self.world.destroy_entity(id) {
            Ok(())
        } else {
            Err(ScriptError::UnknownEntity(id))
        }
    }

    // ---- events ----

    /// Dispatch an event from the game with no sender
    pub fn send(&mut self, id: EntityId, event: impl Into<EventName>) -> Result<ScriptResult, ScriptError> {
        self.send_event(None, id, event, ScriptParameters::new())
    }

    /// Dispatch an event right away
    pub fn send_event(
        &mut self,
        sender: Option<EntityId>,
        target: EntityId,
        event: impl Into<EventName>,
        parameters: ScriptParameters,
    ) -> Result<ScriptResult, ScriptError> {
        if !self.world.entities.contains(target) {
            return Err(ScriptError::UnknownEntity(target));
        }
        let event = event.into();
        Ok(dispatch::send_event(
            &self.registry,
            &mut self.world,
            sender,
            target,
            &event,
            &parameters,
        ))
    }

    /// Dry-run an event; commands with side effects refuse
    pub fn peek_event(&mut self, id: EntityId, event: impl Into<EventName>) -> Result<ScriptResult, ScriptError> {
        if !self.world.entities.contains(id) {
            return Err(ScriptError::UnknownEntity(id));
        }
        let event = event.into();
        Ok(dispatch::peek_event(
            &self.registry,
            &mut self.world,
            None,
            id,
            &event,
            &ScriptParameters::new(),
        ))
    }

    /// Queue an event for a later tick; false when the queue is full
    pub fn queue_event(
        &mut self,
        sender: Option<EntityId>,
        target: EntityId,
        event: impl Into<EventName>,
        parameters: ScriptParameters,
    ) -> bool {
        self.world.queue.push(QueuedEvent {
            sender,
            target,
            event: event.into(),
            parameters,
        })
    }

    /// Send `init` then `initend`; returns the `init` verdict
    pub fn init_entity(&mut self, id: EntityId) -> Result<ScriptResult, ScriptError> {
        let result = self.send(id, ScriptMessage::Init)?;
        if self.world.entities.contains(id) {
            self.send(id, ScriptMessage::InitEnd)?;
        }
        Ok(result)
    }

    /// Run one line of script text against an entity
    pub fn execute_line(&mut self, id: EntityId, text: &str) -> Result<ScriptResult, ScriptError> {
        if !self.world.entities.contains(id) {
            return Err(ScriptError::UnknownEntity(id));
        }
        let source = Arc::new(ScriptSource::from_raw("console", text));
        Ok(dispatch::resume(
            &self.registry,
            &mut self.world,
            source,
            id,
            0,
            None,
            ScriptParameters::new(),
        ))
    }

    // ---- frame ----

    /// Advance game time and run one frame of script work
    pub fn tick(&mut self, dt: Duration) {
        self.world.clock += dt;
        self.process_timers();
        let limit = self.world.config.event_drain_limit;
        self.process_events(limit);
        self.heartbeat();
    }

    /// Fire due timers
    pub fn process_timers(&mut self) {
        timer::check_timers(&self.registry, &mut self.world);
    }

    /// Deliver up to `limit` queued events (0 = all)
    pub fn process_events(&mut self, limit: usize) -> usize {
        queue::process_events(&self.registry, &mut self.world, limit)
    }

    /// Send the main event to the next batch of live entities
    ///
    /// A persistent cursor walks entity handles round robin, so every
    /// entity gets its heartbeat once per `len / batch` frames.
    pub fn heartbeat(&mut self) -> usize {
        let batch = self.world.config.heartbeat_batch.min(self.world.entities.len());
        let mut sent = 0;

        for _ in 0..batch {
            let Some(id) = self.world.entities.next_live(self.world.heartbeat_cursor) else {
                break;
            };
            self.world.heartbeat_cursor = id.index() + 1;

            let Some(event) = self.world.entities.get(id).map(|e| e.main_event.clone()) else {
                continue;
            };
            dispatch::send_event(
                &self.registry,
                &mut self.world,
                None,
                id,
                &event,
                &ScriptParameters::new(),
            );
            sent += 1;
        }
        sent
    }

    /// Clear all script state; with `reinit` every entity is initialized again
    pub fn reset(&mut self, reinit: bool) -> Result<(), ScriptError> {
        self.world.globals.clear();
        self.world.timers.clear();
        self.world.queue.clear();
        self.world.heartbeat_cursor = 0;
        for (_, entity) in self.world.entities.iter_mut() {
            entity.reset_script_state();
        }
        log::info!(target: "ioscript", "script state reset");

        if reinit {
            for id in self.world.entities.ids() {
                if self.world.entities.contains(id) {
                    self.init_entity(id)?;
                }
            }
        }
        Ok(())
    }

    // ---- variables ----

    /// Global variable by script name (`#n`, `&f`, `$s`); unset reads as zero
    pub fn global(&self, name: &str) -> Option<VarValue> {
        let key = VarKey::parse(name).filter(|k| k.scope == VarScope::Global)?;
        Some(self.world.globals.value(key.ty, &key.name))
    }

    pub fn set_global(&mut self, name: &str, value: VarValue) -> Result<(), ScriptError> {
        let key = VarKey::parse(name)
            .filter(|k| k.scope == VarScope::Global)
            .ok_or_else(|| ScriptError::InvalidVariable(name.to_string()))?;
        let value = value.coerce(key.ty);
        self.world.globals.set_key(&key, value);
        Ok(())
    }

    /// Local variable by script name (`§n`, `@f`, `£s`)
    pub fn local(&self, id: EntityId, name: &str) -> Option<VarValue> {
        let key = VarKey::parse(name).filter(|k| k.scope == VarScope::Local)?;
        let entity = self.world.entities.get(id)?;
        Some(entity.locals.value(key.ty, &key.name))
    }

    pub fn set_local(&mut self, id: EntityId, name: &str, value: VarValue) -> Result<(), ScriptError> {
        let key = VarKey::parse(name)
            .filter(|k| k.scope == VarScope::Local)
            .ok_or_else(|| ScriptError::InvalidVariable(name.to_string()))?;
        let entity = self
            .world
            .entities
            .get_mut(id)
            .ok_or(ScriptError::UnknownEntity(id))?;
        entity.locals.set_key(&key, value.coerce(key.ty));
        Ok(())
    }

    /// Every global variable keyed by script name
    pub fn globals_snapshot(&self) -> BTreeMap<String, VarValue> {
        self.world.globals.snapshot(VarScope::Global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityFlags;

    fn engine() -> ScriptEngine {
        ScriptEngine::new(ScriptConfig::default().with_seed(7)).unwrap()
    }

    fn scripted(engine: &mut ScriptEngine, class: &str, text: &str) -> EntityId {
        engine.spawn(Entity::new(class, EntityFlags::NPC).with_script(ScriptSource::new(class, text)))
    }

    #[test]
    fn test_unknown_entity() {
        let mut engine = engine();
        let id = scripted(&mut engine, "npc", "");
        engine.destroy(id).unwrap();
        assert!(matches!(engine.send(id, ScriptMessage::Init), Err(ScriptError::UnknownEntity(_))));
        assert!(engine.destroy(id).is_err());
    }

    #[test]
    fn test_init_entity_sends_initend() {
        let mut engine = engine();
        let id = scripted(
            &mut engine,
            "npc",
            "on init {\n set #a 1\n accept\n}\non initend {\n set #b #a\n accept\n}\n",
        );
        engine.init_entity(id).unwrap();
        assert_eq!(engine.global("#b"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_heartbeat_is_round_robin() {
        let mut engine = ScriptEngine::new(ScriptConfig::default().with_heartbeat_batch(2)).unwrap();
        let ids: Vec<EntityId> = (0..3)
            .map(|_| scripted(&mut engine, "npc", "on main {\n inc §beats 1\n accept\n}\n"))
            .collect();

        engine.heartbeat();
        engine.heartbeat();
        engine.heartbeat();

        let beats: Vec<VarValue> = ids.iter().map(|id| engine.local(*id, "§beats").unwrap()).collect();
        assert_eq!(beats, vec![VarValue::Int(2), VarValue::Int(2), VarValue::Int(2)]);
    }

    #[test]
    fn test_heartbeat_batch_skips_destroyed_entities() {
        let mut engine = ScriptEngine::new(ScriptConfig::default().with_heartbeat_batch(2)).unwrap();
        let ids: Vec<EntityId> = (0..6)
            .map(|_| scripted(&mut engine, "npc", "on main {\n inc §beats 1\n accept\n}\n"))
            .collect();
        for id in &ids[..4] {
            engine.destroy(*id).unwrap();
        }

        assert_eq!(engine.heartbeat(), 2);
        assert_eq!(engine.local(ids[4], "§beats"), Some(VarValue::Int(1)));
        assert_eq!(engine.local(ids[5], "§beats"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_custom_main_event() {
        let mut engine = engine();
        let id = scripted(&mut engine, "npc", "on patrol {\n inc #walks 1\n accept\n}\n");
        engine.entity_mut(id).unwrap().main_event = EventName::parse("patrol");
        engine.heartbeat();
        assert_eq!(engine.global("#walks"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_execute_line() {
        let mut engine = engine();
        let id = scripted(&mut engine, "npc", "");
        let result = engine.execute_line(id, "SET §x 5 set #y 2\nset #z 1").unwrap();
        assert_eq!(result, ScriptResult::Accept);
        assert_eq!(engine.local(id, "§x"), Some(VarValue::Int(5)));
        assert_eq!(engine.global("#y"), Some(VarValue::Int(2)));
        assert_eq!(engine.global("#z"), Some(VarValue::Int(0)));
    }

    #[test]
    fn test_peek_refuses_side_effects() {
        let mut engine = engine();
        let id = scripted(&mut engine, "npc", "on hit {\n if (1 == 1) accept\n}\non die {\n set #x 1\n accept\n}\n");
        assert_eq!(engine.peek_event(id, ScriptMessage::Hit).unwrap(), ScriptResult::Accept);
        assert_eq!(engine.peek_event(id, ScriptMessage::Die).unwrap(), ScriptResult::Refuse);
        assert_eq!(engine.global("#x"), Some(VarValue::Int(0)));
    }

    #[test]
    fn test_reset() {
        let mut engine = engine();
        let id = scripted(&mut engine, "npc", "on init {\n inc #inits 1\n set §x 1\n timert 0 1 nop\n accept\n}\n");
        engine.send(id, ScriptMessage::Init).unwrap();
        engine.queue_event(None, id, "ping", ScriptParameters::new());

        engine.reset(false).unwrap();
        assert!(engine.globals_snapshot().is_empty());
        assert!(engine.timers().is_empty());
        assert!(engine.queue().is_empty());
        assert!(engine.entity(id).unwrap().locals.is_empty());

        engine.reset(true).unwrap();
        assert_eq!(engine.global("#inits"), Some(VarValue::Int(1)));
    }

    #[test]
    fn test_variable_accessors() {
        let mut engine = engine();
        let id = scripted(&mut engine, "npc", "");
        engine.set_global("#n", VarValue::Float(2.9)).unwrap();
        assert_eq!(engine.global("#n"), Some(VarValue::Int(2)));
        assert!(engine.set_global("§n", VarValue::Int(1)).is_err());
        assert!(engine.global("plain").is_none());

        engine.set_local(id, "@speed", VarValue::Int(3)).unwrap();
        assert_eq!(engine.local(id, "@speed"), Some(VarValue::Float(3.0)));
        assert!(engine.local(id, "#speed").is_none());

        let snapshot = engine.globals_snapshot();
        assert_eq!(snapshot.get("#n"), Some(&VarValue::Int(2)));
    }

    #[test]
    fn test_tick_drains_queue() {
        let mut engine = engine();
        let id = scripted(&mut engine, "npc", "on ping {\n set #pinged ^$param1\n accept\n}\n");
        engine.queue_event(None, id, "ping", ScriptParameters::parse("7"));
        assert_eq!(engine.global("#pinged"), Some(VarValue::Int(0)));
        engine.tick(Duration::from_millis(16));
        assert_eq!(engine.global("#pinged"), Some(VarValue::Int(7)));
        assert_eq!(engine.clock(), Duration::from_millis(16));
    }
}
