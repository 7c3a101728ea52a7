//! Deferred event queue
//!
//! Fixed slots; an enqueue claims the first free one and is dropped when
//! none is left. Draining walks the slots front to back, so an event queued
//! during the drain into a slot not yet visited is delivered in the same
//! pass.

use crate::command::CommandRegistry;
use crate::dispatch;
use crate::entity::EntityId;
use crate::event::{EventName, ScriptParameters};
use crate::world::ScriptWorld;

/// An event waiting for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub sender: Option<EntityId>,
    pub target: EntityId,
    pub event: EventName,
    pub parameters: ScriptParameters,
}

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    event: QueuedEvent,
}

/// Bounded slot array of queued events
#[derive(Debug)]
pub struct EventQueue {
    slots: Vec<Option<Slot>>,
    next_seq: u64,
    dropped: u64,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            next_seq: 0,
            dropped: 0,
        }
    }

    /// Queue an event; false when every slot is taken
    pub fn push(&mut self, event: QueuedEvent) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) else {
            self.dropped += 1;
            log::debug!(
                target: "ioscript::queue",
                "queue full, dropped {} for {}",
                event.event,
                event.target
            );
            return false;
        };
        *slot = Some(Slot {
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
        true
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events refused because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Pending events in slot order
    pub fn iter(&self) -> impl Iterator<Item = &QueuedEvent> {
        self.slots.iter().flatten().map(|slot| &slot.event)
    }

    /// Drop every event to or from `entity`
    pub fn clear_for(&mut self, entity: EntityId) {
        for slot in &mut self.slots {
            let involved = matches!(
                slot,
                Some(s) if s.event.target == entity || s.event.sender == Some(entity)
            );
            if involved {
                *slot = None;
            }
        }
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    fn peek_slot(&self, index: usize) -> Option<(u64, QueuedEvent)> {
        self.slots
            .get(index)
            .and_then(Option::as_ref)
            .map(|slot| (slot.seq, slot.event.clone()))
    }

    /// Free a slot unless it was refilled meanwhile
    fn release(&mut self, index: usize, seq: u64) {
        if let Some(slot) = self.slots.get_mut(index) {
            if matches!(slot, Some(s) if s.seq == seq) {
                *slot = None;
            }
        }
    }
}

/// Deliver queued events, at most `limit` of them (0 = all)
///
/// Events whose target no longer exists are dropped on the way and do not
/// count toward `limit`. Returns how many events were delivered.
pub fn process_events(registry: &CommandRegistry, world: &mut ScriptWorld, limit: usize) -> usize {
    let mut delivered = 0;

    for index in 0..world.queue.capacity() {
        let Some((seq, queued)) = world.queue.peek_slot(index) else {
            continue;
        };

        if !world.entities.contains(queued.target) {
            log::trace!(
                target: "ioscript::queue",
                "skipped {} for destroyed {}",
                queued.event,
                queued.target
            );
            world.queue.release(index, seq);
            continue;
        }

        let sender = queued.sender.filter(|s| world.entities.contains(*s));
        dispatch::send_event(
            registry,
            world,
            sender,
            queued.target,
            &queued.event,
            &queued.parameters,
        );

        world.queue.release(index, seq);
        delivered += 1;
        if limit > 0 && delivered >= limit {
            break;
        }
    }

    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityFlags, EntityTable};

    fn event_for(target: EntityId, name: &str) -> QueuedEvent {
        QueuedEvent {
            sender: None,
            target,
            event: EventName::parse(name),
            parameters: ScriptParameters::new(),
        }
    }

    fn target() -> EntityId {
        let mut table = EntityTable::new();
        table.spawn(Entity::new("t", EntityFlags::empty()))
    }

    #[test]
    fn test_overflow_is_dropped() {
        let t = target();
        let mut queue = EventQueue::new(2);
        assert!(queue.push(event_for(t, "a")));
        assert!(queue.push(event_for(t, "b")));
        assert!(!queue.push(event_for(t, "c")));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_first_free_slot_is_claimed() {
        let t = target();
        let mut queue = EventQueue::new(3);
        queue.push(event_for(t, "a"));
        queue.push(event_for(t, "b"));
        queue.release(0, 0);
        queue.push(event_for(t, "c"));

        let names: Vec<String> = queue.iter().map(|e| e.event.to_string()).collect();
        assert_eq!(names, ["c", "b"]);
    }

    #[test]
    fn test_release_checks_sequence() {
        let t = target();
        let mut queue = EventQueue::new(1);
        queue.push(event_for(t, "a"));
        queue.clear();
        queue.push(event_for(t, "b"));
        queue.release(0, 0);
        assert_eq!(queue.len(), 1);
    }
}
