//! Deterministic terrain generation for Haven worlds
//!
//! Architecture:
//! 1. `seed` - Resolves integer/string world seeds to a 32-bit value
//! 2. `rng` - LCG streams shared bit-for-bit with the game server
//! 3. `perlin` - Seeded 2D Perlin noise (permutation table from the LCG)
//! 4. `terrain` - Water and obstacle placement with protected zones
//!
//! The same seed and config always produce the same terrain, on the client
//! and on the server, so both sides agree on walkability without shipping
//! the map over the wire.

mod error;
pub mod perlin;
pub mod rng;
mod seed;
pub mod terrain;

pub use error::ConfigError;
pub use perlin::PerlinNoise;
pub use rng::{derive_stream, Lcg, STREAM_OBSTACLE_KIND, STREAM_OBSTACLE_PLACEMENT, STREAM_RESOURCES};
pub use seed::Seed;
pub use terrain::{
    CellState, NoiseParams, ObstacleKind, ObstaclePlacement, Rect, Terrain, TerrainConfig,
    TerrainGenerator, TerrainJob, MAX_MAP_SIZE,
};
