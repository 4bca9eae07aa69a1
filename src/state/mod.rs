pub mod autotile;
pub mod checksum;
pub mod grid;
pub mod object;
pub mod world;

pub use autotile::{bitmask, AutotileCache, CellSource, Connections};
pub use checksum::GridChecksum;
pub use grid::{CellChange, Grid, GridObserver};
pub use object::{ObjectId, ObjectRegistry, ObjectRole, ObjectSource, PlacedObject};
pub use world::{generate_terrain_in_background, GameWorld};
