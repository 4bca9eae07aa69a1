use crate::mapgen::CellState;
use crate::state::object::{ObjectId, ObjectRole, ObjectSource};

/// World mutations, in the order they were applied, for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// Terrain generated and indexed
    WorldLoaded {
        size: i32,
        seed: u32,
        objects: usize,
    },

    /// A grid cell changed state
    CellChanged {
        x: i32,
        y: i32,
        old: CellState,
        new: CellState,
    },

    /// An object was placed
    ObjectPlaced {
        id: ObjectId,
        asset: String,
        role: ObjectRole,
        source: ObjectSource,
        x: i32,
        y: i32,
    },

    /// An object was removed (harvested, or dropped by the server)
    ObjectRemoved {
        id: ObjectId,
        x: i32,
        y: i32,
    },

    /// A server placement was rejected
    PlacementSkipped {
        id: ObjectId,
        reason: SkipReason,
    },
}

/// Why a server placement was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OutOfBounds,
    ProtectedCell,
    Occupied,
    Water,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::OutOfBounds => "out of bounds",
            SkipReason::ProtectedCell => "protected cell",
            SkipReason::Occupied => "cell occupied",
            SkipReason::Water => "water",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event handler trait
pub trait EventHandler {
    fn on_event(&mut self, event: WorldEvent);
}

/// Simple event collector
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<WorldEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn drain(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventHandler for EventCollector {
    fn on_event(&mut self, event: WorldEvent) {
        self.events.push(event);
    }
}
