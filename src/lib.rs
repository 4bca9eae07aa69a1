//! Haven World Core
//!
//! Seeded terrain, the grid model every other layer derives from, water
//! autotiling, time-sliced pathfinding, and reconciliation of server-owned
//! world objects.

pub mod authority;
pub mod bot;
pub mod client;
pub mod config;
pub mod error;
pub mod state;
pub use haven_mapgen as mapgen;

pub use error::{Error, Result};
pub use config::{PathfindingConfig, WorldConfig};
pub use mapgen::{CellState, ConfigError, Rect, Seed, Terrain, TerrainConfig, TerrainGenerator};
pub use state::{
    bitmask, generate_terrain_in_background, AutotileCache, CellChange, CellSource, Connections,
    GameWorld, Grid, GridChecksum, GridObserver, ObjectRegistry, ObjectRole, ObjectSource,
    PlacedObject,
};
pub use bot::{MoveController, NavGrid, Path, PathOutcome, PathRequest, Pathfinder};
pub use client::{ServerMessage, SyncDiff, WorldEvent, WorldSnapshot, WorldSynchronizer};
pub use authority::AuthoritativeWorld;
