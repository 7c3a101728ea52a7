//! Event identities, parameters and dispatch verdicts

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed script events
///
/// Each named message has a slot in a script's event offset cache, so its
/// `on <name>` block is located once when the script loads. `ExecuteLine`
/// is internal and never appears in script text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ScriptMessage {
    Init,
    InitEnd,
    Main,
    Reset,
    Load,
    Reload,
    InventoryIn,
    InventoryOut,
    InventoryUse,
    Inventory2Open,
    Inventory2Close,
    SceneUse,
    EquipIn,
    EquipOut,
    Combine,
    Chat,
    Action,
    Clicked,
    Dead,
    Die,
    Hit,
    Fight,
    Flee,
    Aggression,
    Strike,
    Critical,
    Backstab,
    Steal,
    Break,
    Identify,
    ReachedTarget,
    LostTarget,
    Move,
    Waypoint,
    PathEnd,
    PathfinderSuccess,
    PathfinderFailure,
    DetectPlayer,
    UndetectPlayer,
    Hear,
    Summoned,
    NpcFollow,
    NpcFight,
    NpcStay,
    TreatIn,
    TreatOut,
    EnterZone,
    LeaveZone,
    ControlledZoneEnter,
    ControlledZoneLeave,
    CollideDoor,
    CollideNpc,
    CollideField,
    CollisionError,
    BookOpen,
    BookClose,
    CineEnd,
    KeyPressed,
    ControlsOn,
    ControlsOff,
    TrapDisarmed,
    SpellCast,
    SpellEnd,
    SpellDecision,
    CursorMode,
    ExplorationMode,
    Custom,
    /// Run a single line starting at an explicit position
    ExecuteLine,
}

impl ScriptMessage {
    /// Messages with a per-script offset cache slot, in slot order
    pub const NAMED: &'static [ScriptMessage] = &[
        Self::Init,
        Self::InitEnd,
        Self::Main,
        Self::Reset,
        Self::Load,
        Self::Reload,
        Self::InventoryIn,
        Self::InventoryOut,
        Self::InventoryUse,
        Self::Inventory2Open,
        Self::Inventory2Close,
        Self::SceneUse,
        Self::EquipIn,
        Self::EquipOut,
        Self::Combine,
        Self::Chat,
        Self::Action,
        Self::Clicked,
        Self::Dead,
        Self::Die,
        Self::Hit,
        Self::Fight,
        Self::Flee,
        Self::Aggression,
        Self::Strike,
        Self::Critical,
        Self::Backstab,
        Self::Steal,
        Self::Break,
        Self::Identify,
        Self::ReachedTarget,
        Self::LostTarget,
        Self::Move,
        Self::Waypoint,
        Self::PathEnd,
        Self::PathfinderSuccess,
        Self::PathfinderFailure,
        Self::DetectPlayer,
        Self::UndetectPlayer,
        Self::Hear,
        Self::Summoned,
        Self::NpcFollow,
        Self::NpcFight,
        Self::NpcStay,
        Self::TreatIn,
        Self::TreatOut,
        Self::EnterZone,
        Self::LeaveZone,
        Self::ControlledZoneEnter,
        Self::ControlledZoneLeave,
        Self::CollideDoor,
        Self::CollideNpc,
        Self::CollideField,
        Self::CollisionError,
        Self::BookOpen,
        Self::BookClose,
        Self::CineEnd,
        Self::KeyPressed,
        Self::ControlsOn,
        Self::ControlsOff,
        Self::TrapDisarmed,
        Self::SpellCast,
        Self::SpellEnd,
        Self::SpellDecision,
        Self::CursorMode,
        Self::ExplorationMode,
        Self::Custom,
    ];

    /// Number of cache slots
    pub const COUNT: usize = Self::NAMED.len();

    /// Name as written after `on` in script text
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Self::Init => "init",
            Self::InitEnd => "initend",
            Self::Main => "main",
            Self::Reset => "reset",
            Self::Load => "load",
            Self::Reload => "reload",
            Self::InventoryIn => "inventoryin",
            Self::InventoryOut => "inventoryout",
            Self::InventoryUse => "inventoryuse",
            Self::Inventory2Open => "inventory2_open",
            Self::Inventory2Close => "inventory2_close",
            Self::SceneUse => "sceneuse",
            Self::EquipIn => "equipin",
            Self::EquipOut => "equipout",
            Self::Combine => "combine",
            Self::Chat => "chat",
            Self::Action => "action",
            Self::Clicked => "clicked",
            Self::Dead => "dead",
            Self::Die => "die",
            Self::Hit => "hit",
            Self::Fight => "fight",
            Self::Flee => "flee",
            Self::Aggression => "aggression",
            Self::Strike => "strike",
            Self::Critical => "critical",
            Self::Backstab => "backstab",
            Self::Steal => "steal",
            Self::Break => "break",
            Self::Identify => "identify",
            Self::ReachedTarget => "reachedtarget",
            Self::LostTarget => "losttarget",
            Self::Move => "move",
            Self::Waypoint => "waypoint",
            Self::PathEnd => "pathend",
            Self::PathfinderSuccess => "pathfinder_success",
            Self::PathfinderFailure => "pathfinder_failure",
            Self::DetectPlayer => "detectplayer",
            Self::UndetectPlayer => "undetectplayer",
            Self::Hear => "hear",
            Self::Summoned => "summoned",
            Self::NpcFollow => "npc_follow",
            Self::NpcFight => "npc_fight",
            Self::NpcStay => "npc_stay",
            Self::TreatIn => "treatin",
            Self::TreatOut => "treatout",
            Self::EnterZone => "enterzone",
            Self::LeaveZone => "leavezone",
            Self::ControlledZoneEnter => "controlledzone_enter",
            Self::ControlledZoneLeave => "controlledzone_leave",
            Self::CollideDoor => "collide_door",
            Self::CollideNpc => "collide_npc",
            Self::CollideField => "collide_field",
            Self::CollisionError => "collision_error",
            Self::BookOpen => "book_open",
            Self::BookClose => "book_close",
            Self::CineEnd => "cine_end",
            Self::KeyPressed => "key_pressed",
            Self::ControlsOn => "controls_on",
            Self::ControlsOff => "controls_off",
            Self::TrapDisarmed => "trap_disarmed",
            Self::SpellCast => "spellcast",
            Self::SpellEnd => "spellend",
            Self::SpellDecision => "spelldecision",
            Self::CursorMode => "cursormode",
            Self::ExplorationMode => "explorationmode",
            Self::Custom => "custom",
            Self::ExecuteLine => return None,
        };
        Some(name)
    }

    /// Offset cache slot
    pub fn slot(self) -> Option<usize> {
        Self::NAMED.iter().position(|m| *m == self)
    }

    /// Look up a named message
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED.iter().copied().find(|m| m.name() == Some(name))
    }
}

/// Event identity: a fixed message or an arbitrary named event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    Message(ScriptMessage),
    Named(String),
}

impl EventName {
    /// Map a script-supplied name to a fixed message when one matches
    pub fn parse(name: &str) -> Self {
        let name = name.strip_prefix("on ").unwrap_or(name).trim();
        let lower = name.to_lowercase();
        match ScriptMessage::from_name(&lower) {
            Some(message) => Self::Message(message),
            None => Self::Named(lower),
        }
    }

    pub fn message(&self) -> Option<ScriptMessage> {
        match self {
            Self::Message(message) => Some(*message),
            Self::Named(_) => None,
        }
    }

    pub fn is(&self, message: ScriptMessage) -> bool {
        self.message() == Some(message)
    }
}

impl From<ScriptMessage> for EventName {
    fn from(message: ScriptMessage) -> Self {
        Self::Message(message)
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => match message.name() {
                Some(name) => f.write_str(name),
                None => write!(f, "{:?}", message),
            },
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Positional event parameters
///
/// Built from a space separated list where double quotes group words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptParameters {
    values: Vec<String>,
}

impl ScriptParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a parameter string
    pub fn parse(text: &str) -> Self {
        let mut values = Vec::new();
        let mut current = String::new();
        let mut quoted = false;
        let mut pending = false;

        for c in text.chars() {
            match c {
                '"' => {
                    quoted = !quoted;
                    pending = true;
                }
                c if c.is_whitespace() && !quoted => {
                    if pending {
                        values.push(std::mem::take(&mut current));
                        pending = false;
                    }
                }
                c => {
                    current.push(c);
                    pending = true;
                }
            }
        }
        if pending {
            values.push(current);
        }

        Self { values }
    }

    /// 0-based parameter
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ScriptParameters {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for ScriptParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if value.is_empty() || value.contains(char::is_whitespace) {
                write!(f, "\"{}\"", value)?;
            } else {
                f.write_str(value)?;
            }
        }
        Ok(())
    }
}

/// Verdict of one dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptResult {
    /// Default action allowed
    Accept,
    /// Default action suppressed
    Refuse,
    /// Script aborted with an error
    Error,
    /// The script destroyed its own entity
    Destructive,
}

impl ScriptResult {
    pub fn is_accept(self) -> bool {
        self == Self::Accept
    }

    pub fn is_refuse(self) -> bool {
        self == Self::Refuse
    }
}
