//! Reconciles server object snapshots with the local world
//!
//! Only `server`-sourced objects are ever removed by a snapshot. Terrain and
//! player-built objects keep their cells; a server object that lands on one
//! is skipped, not forced in.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::client::events::{SkipReason, WorldEvent};
use crate::error::{Error, Result};
use crate::mapgen::CellState;
use crate::state::object::{ObjectId, ObjectRole, ObjectSource, PlacedObject};
use crate::state::world::GameWorld;

/// One object as the server describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotObject {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub role: ObjectRole,
    pub asset: String,
    pub x: i32,
    pub y: i32,
}

impl SnapshotObject {
    pub fn new(id: impl Into<ObjectId>, asset: impl Into<String>, role: ObjectRole, x: i32, y: i32) -> Self {
        Self {
            id: id.into(),
            role,
            asset: asset.into(),
            x,
            y,
        }
    }

    fn to_placed(&self) -> PlacedObject {
        PlacedObject::new(
            self.id.clone(),
            self.asset.clone(),
            self.role,
            self.x,
            self.y,
            ObjectSource::Server,
        )
    }
}

/// Full authoritative object list, `{"resources": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default)]
    pub resources: Vec<SnapshotObject>,
}

impl WorldSnapshot {
    pub fn new(resources: Vec<SnapshotObject>) -> Self {
        Self { resources }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }
}

/// World-object messages from the server, tagged by `type`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "WORLD_STATE")]
    WorldState { payload: WorldSnapshot },

    #[serde(rename = "RESOURCE_PLACED")]
    ResourcePlaced { resource: SnapshotObject },

    #[serde(rename = "RESOURCE_REMOVED")]
    ResourceRemoved { id: ObjectId },

    /// Chat, players, wallet and the rest; not world state.
    #[serde(other)]
    Other,
}

impl ServerMessage {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPlacement {
    pub id: ObjectId,
    pub x: i32,
    pub y: i32,
    pub reason: SkipReason,
}

/// Result of one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncDiff {
    pub added: Vec<ObjectId>,
    pub removed: Vec<ObjectId>,
    pub skipped: Vec<SkippedPlacement>,
}

impl SyncDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.skipped.is_empty()
    }

    /// Added and removed only; skips do not change the world.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Running totals across every message handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub snapshots: u64,
    pub added: u64,
    pub removed: u64,
    pub skipped: u64,
}

/// Applies server world-object messages to a `GameWorld`.
///
/// Rejected placements are retried on every snapshot but reported in
/// `SyncDiff::skipped` only the first time, so an unchanged snapshot yields
/// an empty diff.
#[derive(Debug, Default)]
pub struct WorldSynchronizer {
    stats: SyncStats,
    rejected: AHashSet<ObjectId>,
}

impl WorldSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Reconcile the world's server objects with a full snapshot.
    ///
    /// Tracked server objects missing from the snapshot are removed, unknown
    /// ids are placed, and tracked ids are left alone.
    pub fn sync(&mut self, world: &mut GameWorld, snapshot: &WorldSnapshot) -> SyncDiff {
        let incoming: AHashSet<&str> = snapshot.resources.iter().map(|r| r.id.as_str()).collect();
        let mut diff = SyncDiff::default();

        for id in world.objects().ids_from(ObjectSource::Server) {
            if incoming.contains(id.as_str()) {
                continue;
            }
            match world.remove_object(&id) {
                Ok(_) => diff.removed.push(id),
                Err(e) => tracing::warn!(%id, error = %e, "failed to remove stale server object"),
            }
        }

        self.rejected.retain(|id| incoming.contains(id.as_str()));
        for object in &snapshot.resources {
            self.place(world, object, &mut diff);
        }

        self.stats.snapshots += 1;
        self.record(&diff);
        tracing::info!(
            incoming = snapshot.resources.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            skipped = diff.skipped.len(),
            "world synced"
        );
        diff
    }

    /// Single placement pushed by the server
    pub fn apply_placed(&mut self, world: &mut GameWorld, object: &SnapshotObject) -> SyncDiff {
        let mut diff = SyncDiff::default();
        self.place(world, object, &mut diff);
        self.record(&diff);
        diff
    }

    /// Single removal pushed by the server. Ids that are unknown or not
    /// server-owned are ignored.
    pub fn apply_removed(&mut self, world: &mut GameWorld, id: &str) -> SyncDiff {
        let mut diff = SyncDiff::default();
        let server_owned = world
            .objects()
            .get(id)
            .map(|o| o.source == ObjectSource::Server)
            .unwrap_or(false);
        if !server_owned {
            tracing::debug!(id, "ignoring removal of untracked object");
            return diff;
        }
        if world.remove_object(id).is_ok() {
            diff.removed.push(id.to_string());
        }
        self.record(&diff);
        diff
    }

    pub fn handle(&mut self, world: &mut GameWorld, message: &ServerMessage) -> SyncDiff {
        match message {
            ServerMessage::WorldState { payload } => self.sync(world, payload),
            ServerMessage::ResourcePlaced { resource } => self.apply_placed(world, resource),
            ServerMessage::ResourceRemoved { id } => self.apply_removed(world, id),
            ServerMessage::Other => SyncDiff::default(),
        }
    }

    fn place(&mut self, world: &mut GameWorld, object: &SnapshotObject, diff: &mut SyncDiff) {
        if world.objects().contains(&object.id) {
            return;
        }
        let reason = match conflict(world, object) {
            None => match world.place_object(object.to_placed()) {
                Ok(()) => {
                    self.rejected.remove(&object.id);
                    diff.added.push(object.id.clone());
                    return;
                }
                Err(_) => SkipReason::Occupied,
            },
            Some(reason) => reason,
        };

        if !self.rejected.insert(object.id.clone()) {
            return;
        }
        tracing::warn!(
            id = %object.id,
            x = object.x,
            y = object.y,
            reason = %reason,
            "skipped server placement"
        );
        world.record_event(WorldEvent::PlacementSkipped {
            id: object.id.clone(),
            reason,
        });
        diff.skipped.push(SkippedPlacement {
            id: object.id.clone(),
            x: object.x,
            y: object.y,
            reason,
        });
    }

    fn record(&mut self, diff: &SyncDiff) {
        self.stats.added += diff.added.len() as u64;
        self.stats.removed += diff.removed.len() as u64;
        self.stats.skipped += diff.skipped.len() as u64;
    }
}

fn conflict(world: &GameWorld, object: &SnapshotObject) -> Option<SkipReason> {
    let (x, y) = (object.x, object.y);
    if !world.grid().in_bounds(x, y) {
        return Some(SkipReason::OutOfBounds);
    }
    if object.role.is_blocking() && world.is_in_house(x, y) {
        return Some(SkipReason::ProtectedCell);
    }
    if world.objects().is_occupied(x, y) {
        return Some(SkipReason::Occupied);
    }
    match world.cell(x, y) {
        CellState::Empty => None,
        CellState::Water => Some(SkipReason::Water),
        CellState::Obstacle => Some(SkipReason::Occupied),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::mapgen::Rect;

    fn world() -> GameWorld {
        GameWorld::blank(WorldConfig {
            map_size: 20,
            house: Rect::new(10, 10, 3, 3),
            spawn: Rect::new(0, 0, 2, 2),
            ..WorldConfig::default()
        })
        .unwrap()
    }

    fn rock(id: &str, x: i32, y: i32) -> SnapshotObject {
        SnapshotObject::new(id, "rock", ObjectRole::Obstacle, x, y)
    }

    #[test]
    fn test_add_then_remove_scenario() {
        let mut world = world();
        let mut sync = WorldSynchronizer::new();

        let diff = sync.sync(&mut world, &WorldSnapshot::new(vec![rock("r1", 5, 5)]));
        assert_eq!(diff.added, vec!["r1"]);
        assert!(diff.removed.is_empty());
        assert_eq!(world.cell(5, 5), CellState::Obstacle);
        assert!(!world.pathfinder().is_walkable(5, 5));

        let diff = sync.sync(&mut world, &WorldSnapshot::default());
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, vec!["r1"]);
        assert_eq!(world.cell(5, 5), CellState::Empty);
        assert!(world.pathfinder().is_walkable(5, 5));
        world.check_consistency().unwrap();
    }

    #[test]
    fn test_sync_is_idempotent() {
        let mut world = world();
        let mut sync = WorldSynchronizer::new();
        let snapshot = WorldSnapshot::new(vec![
            rock("r1", 3, 3),
            SnapshotObject::new("p1", "path_stone", ObjectRole::Floor, 4, 4),
        ]);
        let first = sync.sync(&mut world, &snapshot);
        assert_eq!(first.added.len(), 2);
        let second = sync.sync(&mut world, &snapshot);
        assert!(second.is_empty());
        assert_eq!(world.objects().len(), 2);
        assert_eq!(world.cell(4, 4), CellState::Empty);
    }

    #[test]
    fn test_conflicts_are_skipped() {
        let mut world = world();
        world.build(6, 6, "chest", ObjectRole::Obstacle).unwrap();
        world.set_cell(7, 7, CellState::Water).unwrap();

        let mut sync = WorldSynchronizer::new();
        let snapshot = WorldSnapshot::new(vec![
            rock("on_chest", 6, 6),
            rock("in_lake", 7, 7),
            rock("in_house", 11, 11),
            rock("off_map", 25, 3),
            SnapshotObject::new("rug", "rug", ObjectRole::Floor, 11, 11),
            rock("ok", 8, 8),
        ]);
        let diff = sync.sync(&mut world, &snapshot);
        assert_eq!(diff.added, vec!["rug", "ok"]);
        let reasons: Vec<_> = diff.skipped.iter().map(|s| (s.id.as_str(), s.reason)).collect();
        assert_eq!(
            reasons,
            vec![
                ("on_chest", SkipReason::Occupied),
                ("in_lake", SkipReason::Water),
                ("in_house", SkipReason::ProtectedCell),
                ("off_map", SkipReason::OutOfBounds),
            ]
        );
        // The player's chest is still there.
        assert_eq!(world.objects().at(6, 6).map(|o| o.source), Some(ObjectSource::Local));
        world.check_consistency().unwrap();
        assert_eq!(sync.stats().skipped, 4);

        // Unchanged snapshot: nothing new to report.
        assert!(sync.sync(&mut world, &snapshot).is_empty());

        // Once the chest is gone the server object gets its cell.
        world.harvest(6, 6).unwrap();
        let diff = sync.sync(&mut world, &snapshot);
        assert_eq!(diff.added, vec!["on_chest"]);
        assert!(diff.skipped.is_empty());
        world.check_consistency().unwrap();
    }

    #[test]
    fn test_local_objects_survive_snapshots() {
        let mut world = world();
        let id = world.build(3, 8, "fence", ObjectRole::Obstacle).unwrap();
        let mut sync = WorldSynchronizer::new();
        let diff = sync.sync(&mut world, &WorldSnapshot::default());
        assert!(diff.removed.is_empty());
        assert!(world.objects().contains(&id));
    }

    #[test]
    fn test_incremental_messages() {
        let mut world = world();
        let mut sync = WorldSynchronizer::new();

        let placed = ServerMessage::from_json(
            r#"{"type": "RESOURCE_PLACED", "resource": {"id": "wall_2_3_1", "type": "obstacle", "asset": "wall", "x": 2, "y": 3}}"#,
        )
        .unwrap();
        let diff = sync.handle(&mut world, &placed);
        assert_eq!(diff.added, vec!["wall_2_3_1"]);

        // Duplicate placement leaves the existing object untouched.
        assert!(sync.handle(&mut world, &placed).is_empty());

        let removed =
            ServerMessage::from_json(r#"{"type": "RESOURCE_REMOVED", "id": "wall_2_3_1", "x": 2, "y": 3}"#).unwrap();
        let diff = sync.handle(&mut world, &removed);
        assert_eq!(diff.removed, vec!["wall_2_3_1"]);
        assert!(world.is_walkable(2, 3));

        // Unknown ids are ignored.
        assert!(sync.apply_removed(&mut world, "ghost").is_empty());

        let chat = ServerMessage::from_json(r#"{"type": "CHAT_MESSAGE", "text": "hi"}"#).unwrap();
        assert_eq!(chat, ServerMessage::Other);
    }

    #[test]
    fn test_removal_ignores_local_objects() {
        let mut world = world();
        let id = world.build(9, 2, "fence", ObjectRole::Obstacle).unwrap();
        let mut sync = WorldSynchronizer::new();
        assert!(sync.apply_removed(&mut world, &id).is_empty());
        assert!(world.objects().contains(&id));
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot = WorldSnapshot::from_json(
            r#"{"resources": [{"id": "tree_40_2", "asset": "tree", "type": "obstacle", "x": 40, "y": 2}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.resources[0].role, ObjectRole::Obstacle);
        assert_eq!(snapshot.resources[0].x, 40);

        assert_eq!(WorldSnapshot::from_json("{}").unwrap(), WorldSnapshot::default());
        assert!(matches!(
            WorldSnapshot::from_json(r#"{"resources": [{"id": 1}]}"#),
            Err(Error::InvalidSnapshot(_))
        ));

        let round = WorldSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(round, snapshot);
    }

    #[test]
    fn test_events_for_sync() {
        let mut world = world();
        world.drain_events();
        let mut sync = WorldSynchronizer::new();
        sync.sync(&mut world, &WorldSnapshot::new(vec![rock("r1", 5, 5), rock("bad", 50, 50)]));
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(e, WorldEvent::ObjectPlaced { id, .. } if id == "r1")));
        assert!(events
            .iter()
            .any(|e| matches!(e, WorldEvent::PlacementSkipped { reason: SkipReason::OutOfBounds, .. })));
    }
}
