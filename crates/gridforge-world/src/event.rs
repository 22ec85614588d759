//! Typed world notifications with per-kind history ring buffers.
//!
//! Events are queued while a tick or a mutation runs and delivered in one
//! batch when it finishes, in emission order. Each kind keeps a bounded
//! history of delivered events for polling consumers.
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventBus::suppress`], which drops
//! them at emission. Suppressed kinds are never queued or recorded.

use gridforge_core::fixed::Ticks;
use gridforge_core::id::BuildingId;
use gridforge_core::item::ItemKind;
use gridforge_power::Cable;
use gridforge_spatial::GridPosition;

use crate::building::OperationStatus;
use crate::catalog::BuildingKind;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A world event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BuildingPlaced {
        building: BuildingId,
        kind: BuildingKind,
        position: GridPosition,
        tick: Ticks,
    },
    BuildingRemoved {
        building: BuildingId,
        kind: BuildingKind,
        position: GridPosition,
        tick: Ticks,
    },
    ResourceMined {
        building: BuildingId,
        item: ItemKind,
        tile: GridPosition,
        tick: Ticks,
    },
    TileDepleted {
        position: GridPosition,
        tick: Ticks,
    },
    ItemCrafted {
        building: BuildingId,
        item: ItemKind,
        quantity: u32,
        tick: Ticks,
    },
    StatusChanged {
        building: BuildingId,
        from: OperationStatus,
        to: OperationStatus,
        tick: Ticks,
    },
    CableAdded {
        cable: Cable,
        tick: Ticks,
    },
    CableRemoved {
        cable: Cable,
        tick: Ticks,
    },
}

/// Discriminant tag for event types, used for suppression and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BuildingPlaced,
    BuildingRemoved,
    ResourceMined,
    TileDepleted,
    ItemCrafted,
    StatusChanged,
    CableAdded,
    CableRemoved,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 8;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BuildingPlaced { .. } => EventKind::BuildingPlaced,
            Event::BuildingRemoved { .. } => EventKind::BuildingRemoved,
            Event::ResourceMined { .. } => EventKind::ResourceMined,
            Event::TileDepleted { .. } => EventKind::TileDepleted,
            Event::ItemCrafted { .. } => EventKind::ItemCrafted,
            Event::StatusChanged { .. } => EventKind::StatusChanged,
            Event::CableAdded { .. } => EventKind::CableAdded,
            Event::CableRemoved { .. } => EventKind::CableRemoved,
        }
    }

    pub fn tick(&self) -> Ticks {
        match self {
            Event::BuildingPlaced { tick, .. }
            | Event::BuildingRemoved { tick, .. }
            | Event::ResourceMined { tick, .. }
            | Event::TileDepleted { tick, .. }
            | Event::ItemCrafted { tick, .. }
            | Event::StatusChanged { tick, .. }
            | Event::CableAdded { tick, .. }
            | Event::CableRemoved { tick, .. } => *tick,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer -- fixed-capacity ring buffer
// ---------------------------------------------------------------------------

/// A ring buffer of delivered events. When full, the oldest are dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Next write position.
    head: usize,
    len: usize,
    /// Total events ever written (including dropped).
    total_written: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        let capacity = self.capacity();
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    pub fn clear(&mut self) {
        self.events.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

struct Subscriber {
    /// `None` listens to every kind.
    kind: Option<EventKind>,
    listener: PassiveListener,
}

pub struct EventBus {
    pending: Vec<Event>,
    history: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: Vec<Subscriber>,
    history_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("pending", &self.pending)
            .field("history", &self.history)
            .field("suppressed", &self.suppressed)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: Vec::new(),
            history_capacity,
        }
    }

    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.history[kind.index()] = None;
        self.pending.retain(|e| e.kind() != kind);
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Queue an event for the next delivery. No-op for suppressed kinds.
    pub fn emit(&mut self, event: Event) {
        if !self.suppressed[event.kind().index()] {
            self.pending.push(event);
        }
    }

    /// Listen to one kind. Listeners run in registration order.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.subscribers.push(Subscriber {
            kind: Some(kind),
            listener,
        });
    }

    /// Listen to every kind.
    pub fn on_any(&mut self, listener: PassiveListener) {
        self.subscribers.push(Subscriber {
            kind: None,
            listener,
        });
    }

    /// Hand every queued event to listeners, then record it in history.
    pub fn deliver(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.pending);
        for event in events {
            let kind = event.kind();
            for sub in &mut self.subscribers {
                if sub.kind.is_none_or(|k| k == kind) {
                    (sub.listener)(&event);
                }
            }
            let capacity = self.history_capacity;
            self.history[kind.index()]
                .get_or_insert_with(|| EventBuffer::new(capacity))
                .push(event);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Delivered history for one kind.
    pub fn history(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.history[kind.index()].as_ref()
    }

    pub fn total_delivered(&self, kind: EventKind) -> u64 {
        self.history(kind).map_or(0, EventBuffer::total_written)
    }

    /// Drop pending events and history. Listeners and suppression stay.
    pub fn clear_all(&mut self) {
        self.pending.clear();
        for buffer in self.history.iter_mut().flatten() {
            buffer.clear();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
