pub mod events;
pub mod sync;

pub use events::{EventCollector, EventHandler, SkipReason, WorldEvent};
pub use sync::{
    ServerMessage, SkippedPlacement, SnapshotObject, SyncDiff, SyncStats, WorldSnapshot,
    WorldSynchronizer,
};
