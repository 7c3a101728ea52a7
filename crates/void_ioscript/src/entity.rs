//! Scripted entities
//!
//! The interpreter only needs a narrow view of a game object: its
//! identity, capability flags, group and type memberships, a position for
//! distance queries, its two scripts and its local script state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event::{EventName, ScriptMessage};
use crate::source::ScriptSource;
use crate::variables::VariableTable;

/// Number of script stopwatch slots per entity
pub const STOPWATCH_COUNT: usize = 4;

/// Class name whose single instance is addressed as `player`
pub const PLAYER_CLASS: &str = "player";

bitflags::bitflags! {
    /// Entity capabilities checked against a command's requirements
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntityFlags: u32 {
        const NPC = 1 << 0;
        const ITEM = 1 << 1;
        const FIX = 1 << 2;
        const CAMERA = 1 << 3;
        const MARKER = 1 << 4;
    }
}

/// Stable entity handle; slots are never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A game object driven by scripts
#[derive(Debug, Clone)]
pub struct Entity {
    pub class: String,
    pub instance: u32,
    pub flags: EntityFlags,
    pub groups: BTreeSet<String>,
    pub types: BTreeSet<String>,
    pub position: [f64; 3],
    /// Inside the active simulation zone
    pub in_active_zone: bool,
    /// Idents of carried items
    pub inventory: Vec<String>,
    pub script: Arc<ScriptSource>,
    pub over_script: Arc<ScriptSource>,
    pub locals: VariableTable,
    pub stopwatches: [Option<Duration>; STOPWATCH_COUNT],
    pub disabled_events: BTreeSet<ScriptMessage>,
    pub main_event: EventName,
}

impl Entity {
    pub fn new(class: impl Into<String>, flags: EntityFlags) -> Self {
        Self {
            class: class.into().to_lowercase(),
            instance: 0,
            flags,
            groups: BTreeSet::new(),
            types: BTreeSet::new(),
            position: [0.0; 3],
            in_active_zone: true,
            inventory: Vec::new(),
            script: Arc::new(ScriptSource::empty()),
            over_script: Arc::new(ScriptSource::empty()),
            locals: VariableTable::new(),
            stopwatches: [None; STOPWATCH_COUNT],
            disabled_events: BTreeSet::new(),
            main_event: ScriptMessage::Main.into(),
        }
    }

    pub fn with_script(mut self, script: ScriptSource) -> Self {
        self.script = Arc::new(script);
        self
    }

    pub fn with_override(mut self, script: ScriptSource) -> Self {
        self.over_script = Arc::new(script);
        self
    }

    pub fn with_position(mut self, position: [f64; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into().to_lowercase());
        self
    }

    pub fn with_type(mut self, ty: impl Into<String>) -> Self {
        self.types.insert(ty.into().to_lowercase());
        self
    }

    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.inventory.push(item.into().to_lowercase());
        self
    }

    pub fn with_active_zone(mut self, active: bool) -> Self {
        self.in_active_zone = active;
        self
    }

    /// Script-visible identifier (`goblin_0001`, `player`)
    pub fn ident(&self) -> String {
        if self.class == PLAYER_CLASS {
            PLAYER_CLASS.to_string()
        } else {
            format!("{}_{:04}", self.class, self.instance)
        }
    }

    pub fn distance_to(&self, other: &Entity) -> f64 {
        let [ax, ay, az] = self.position;
        let [bx, by, bz] = other.position;
        ((ax - bx).powi(2) + (ay - by).powi(2) + (az - bz).powi(2)).sqrt()
    }

    pub fn is_event_enabled(&self, event: &EventName) -> bool {
        match event.message() {
            Some(message) => !self.disabled_events.contains(&message),
            None => true,
        }
    }

    /// Forget all script state (locals and stopwatches)
    pub fn reset_script_state(&mut self) {
        self.locals.clear();
        self.stopwatches = [None; STOPWATCH_COUNT];
        self.disabled_events.clear();
        self.main_event = ScriptMessage::Main.into();
    }
}

/// Script reference to an entity, before lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef<'a> {
    /// `self` / `me`
    This,
    Player,
    /// `none`
    Nothing,
    Ident(&'a str),
}

impl<'a> EntityRef<'a> {
    pub fn parse(word: &'a str) -> Self {
        match word {
            "self" | "me" => Self::This,
            "player" => Self::Player,
            "none" | "" => Self::Nothing,
            ident => Self::Ident(ident),
        }
    }
}

/// All live entities in handle order
///
/// Handles come from a counter and are never reused; removing an entity
/// frees its storage.
#[derive(Debug, Default)]
pub struct EntityTable {
    entities: BTreeMap<EntityId, Entity>,
    next_id: u32,
    instances: HashMap<String, u32>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, numbering it within its class
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let next = self.instances.entry(entity.class.clone()).or_insert(0);
        *next += 1;
        entity.instance = *next;

        let id = EntityId(self.next_id);
        self.next_id += 1;
        log::debug!(target: "ioscript", "spawned {} as {}", entity.ident(), id);
        self.entities.insert(id, entity);
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// First live entity whose handle index is at least `index`, wrapping
    /// around to the first entity
    pub fn next_live(&self, index: usize) -> Option<EntityId> {
        let from = EntityId(u32::try_from(index).unwrap_or(u32::MAX));
        self.entities
            .range(from..)
            .next()
            .or_else(|| self.entities.iter().next())
            .map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live entity handles in spawn order
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().map(|(id, e)| (*id, e))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut Entity)> {
        self.entities.iter_mut().map(|(id, e)| (*id, e))
    }

    pub fn find(&self, ident: &str) -> Option<EntityId> {
        self.iter().find(|(_, e)| e.ident() == ident).map(|(id, _)| id)
    }

    pub fn player(&self) -> Option<EntityId> {
        self.iter().find(|(_, e)| e.class == PLAYER_CLASS).map(|(id, _)| id)
    }

    /// Resolve a script entity word relative to `this`
    pub fn resolve(&self, word: &str, this: EntityId) -> Option<EntityId> {
        match EntityRef::parse(word) {
            EntityRef::This => self.contains(this).then_some(this),
            EntityRef::Player => self.player(),
            EntityRef::Nothing => None,
            EntityRef::Ident(ident) => self.find(ident),
        }
    }

    /// Ident of an entity, or `none`
    pub fn ident_of(&self, id: Option<EntityId>) -> String {
        id.and_then(|id| self.get(id))
            .map(Entity::ident)
            .unwrap_or_else(|| "none".to_string())
    }
}
