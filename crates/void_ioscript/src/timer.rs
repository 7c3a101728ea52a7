//! Script timers
//!
//! A timer remembers a position in its owner's script and re-enters the
//! dispatcher there in single-line mode each time it fires. Timers live in
//! a flat slot vector; the sweep visits slots in order, so two timers due in
//! the same tick fire in slot order regardless of their due instants.

use std::sync::Arc;
use std::time::Duration;

use crate::command::CommandRegistry;
use crate::dispatch;
use crate::entity::EntityId;
use crate::event::ScriptParameters;
use crate::source::ScriptSource;
use crate::world::ScriptWorld;

/// A scheduled resumption
#[derive(Debug, Clone)]
pub struct ScriptTimer {
    pub name: String,
    pub entity: EntityId,
    pub source: Arc<ScriptSource>,
    /// Resume offset in `source`
    pub pos: usize,
    pub interval: Duration,
    /// Fires left, 0 = forever
    pub count: u32,
    /// Start of the current interval
    pub start: Duration,
    /// Only advance, never fire, while the owner is outside the active zone
    pub idle: bool,
}

impl ScriptTimer {
    pub fn due_at(&self) -> Duration {
        self.start + self.interval
    }
}

/// All timers of a session
#[derive(Debug, Default)]
pub struct TimerSet {
    slots: Vec<Option<ScriptTimer>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer, replacing one with the same owner and name
    pub fn start(&mut self, timer: ScriptTimer) {
        self.stop(timer.entity, &timer.name);
        log::trace!(
            target: "ioscript::timer",
            "start {} on {} ({:?} x{})",
            timer.name,
            timer.entity,
            timer.interval,
            timer.count
        );
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(timer),
            None => self.slots.push(Some(timer)),
        }
    }

    /// Remove a named timer; true when one existed
    pub fn stop(&mut self, entity: EntityId, name: &str) -> bool {
        let mut found = false;
        for slot in &mut self.slots {
            if matches!(slot, Some(t) if t.entity == entity && t.name == name) {
                *slot = None;
                found = true;
            }
        }
        found
    }

    /// Remove every timer owned by `entity`
    pub fn clear_for(&mut self, entity: EntityId) -> usize {
        let mut removed = 0;
        for slot in &mut self.slots {
            if matches!(slot, Some(t) if t.entity == entity) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn get(&self, entity: EntityId, name: &str) -> Option<&ScriptTimer> {
        self.iter().find(|t| t.entity == entity && t.name == name)
    }

    pub fn contains(&self, entity: EntityId, name: &str) -> bool {
        self.get(entity, name).is_some()
    }

    /// Lowest free `timer_N` name for an entity
    pub fn default_name(&self, entity: EntityId) -> String {
        (1..)
            .map(|n| format!("timer_{}", n))
            .find(|name| !self.contains(entity, name))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptTimer> {
        self.slots.iter().flatten()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&ScriptTimer> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut ScriptTimer> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub(crate) fn clear_slot(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = None;
        }
    }
}

/// Fire every due timer once
pub fn check_timers(registry: &CommandRegistry, world: &mut ScriptWorld) {
    let now = world.clock;
    let mut index = 0;

    while index < world.timers.slot_count() {
        let slot = index;
        index += 1;

        let Some(timer) = world.timers.slot(slot) else {
            continue;
        };
        if timer.due_at() > now {
            continue;
        }

        let entity = timer.entity;
        let Some(owner) = world.entities.get(entity) else {
            world.timers.clear_slot(slot);
            continue;
        };

        if timer.idle && !owner.in_active_zone {
            if let Some(timer) = world.timers.slot_mut(slot) {
                catch_up(timer, now);
            }
            continue;
        }

        let source = timer.source.clone();
        let pos = timer.pos;
        let name = timer.name.clone();

        if timer.count == 1 {
            world.timers.clear_slot(slot);
        } else if let Some(timer) = world.timers.slot_mut(slot) {
            if timer.count > 0 {
                timer.count -= 1;
            }
            if timer.interval.is_zero() {
                timer.start = now;
            } else {
                timer.start += timer.interval;
            }
        }

        log::trace!(target: "ioscript::timer", "fire {} on {}", name, entity);
        dispatch::resume(
            registry,
            world,
            source,
            entity,
            pos,
            Some(name),
            ScriptParameters::new(),
        );
    }
}

/// Advance an idle timer past `now` in whole intervals
fn catch_up(timer: &mut ScriptTimer, now: Duration) {
    if timer.interval.is_zero() {
        timer.start = now;
        return;
    }
    let elapsed = now.saturating_sub(timer.start);
    let intervals = (elapsed.as_nanos() / timer.interval.as_nanos()) as u32;
    timer.start += timer.interval * intervals;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(entity: EntityId, name: &str, pos: usize) -> ScriptTimer {
        ScriptTimer {
            name: name.to_string(),
            entity,
            source: Arc::new(ScriptSource::empty()),
            pos,
            interval: Duration::from_secs(1),
            count: 3,
            start: Duration::ZERO,
            idle: false,
        }
    }

    fn ids() -> (EntityId, EntityId) {
        let mut table = crate::entity::EntityTable::new();
        let flags = crate::entity::EntityFlags::empty();
        let a = table.spawn(crate::entity::Entity::new("a", flags));
        let b = table.spawn(crate::entity::Entity::new("b", flags));
        (a, b)
    }

    #[test]
    fn test_same_name_replaces() {
        let (a, _) = ids();
        let mut timers = TimerSet::new();
        timers.start(timer(a, "t", 1));
        timers.start(timer(a, "t", 2));

        assert_eq!(timers.len(), 1);
        assert_eq!(timers.get(a, "t").unwrap().pos, 2);
    }

    #[test]
    fn test_names_are_per_entity() {
        let (a, b) = ids();
        let mut timers = TimerSet::new();
        timers.start(timer(a, "t", 1));
        timers.start(timer(b, "t", 2));
        assert_eq!(timers.len(), 2);

        assert_eq!(timers.clear_for(a), 1);
        assert!(timers.contains(b, "t"));
    }

    #[test]
    fn test_default_name_picks_lowest_free() {
        let (a, _) = ids();
        let mut timers = TimerSet::new();
        assert_eq!(timers.default_name(a), "timer_1");
        timers.start(timer(a, "timer_1", 0));
        timers.start(timer(a, "timer_3", 0));
        assert_eq!(timers.default_name(a), "timer_2");
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let (a, _) = ids();
        let mut timers = TimerSet::new();
        timers.start(timer(a, "x", 0));
        timers.start(timer(a, "y", 0));
        timers.stop(a, "x");
        timers.start(timer(a, "z", 0));

        assert_eq!(timers.slot_count(), 2);
        assert_eq!(timers.slot(0).unwrap().name, "z");
    }

    #[test]
    fn test_catch_up_skips_whole_intervals() {
        let (a, _) = ids();
        let mut t = timer(a, "t", 0);
        catch_up(&mut t, Duration::from_millis(3500));
        assert_eq!(t.start, Duration::from_secs(3));
        assert_eq!(t.due_at(), Duration::from_secs(4));
    }
}
