use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mapgen::{NoiseParams, Rect, TerrainConfig};

/// Pathfinding search limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Nodes expanded before a search yields to the runtime.
    pub iterations_per_slice: usize,
    /// Hard cap on expansions; a search past this reports no path.
    pub max_expanded: usize,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            iterations_per_slice: 256,
            max_expanded: 100_000,
        }
    }
}

/// Everything needed to build a world, passed in explicitly.
///
/// JSON layout is flat for the terrain fields with a nested `pathfinding`
/// table. Missing fields take the game defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub map_size: i32,
    pub house: Rect,
    pub spawn: Rect,
    pub obstacle_chance: f64,
    pub tree_vs_rock_ratio: f64,
    pub noise: NoiseParams,
    pub pathfinding: PathfindingConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let terrain = TerrainConfig::default();
        Self {
            map_size: terrain.map_size,
            house: terrain.house,
            spawn: terrain.spawn,
            obstacle_chance: terrain.obstacle_chance,
            tree_vs_rock_ratio: terrain.tree_vs_rock_ratio,
            noise: terrain.noise,
            pathfinding: PathfindingConfig::default(),
        }
    }
}

impl WorldConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: WorldConfig = serde_json::from_str(json)
            .map_err(|e| Error::Io(format!("config parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.terrain().validate()?;
        Ok(())
    }

    pub fn terrain(&self) -> TerrainConfig {
        TerrainConfig {
            map_size: self.map_size,
            house: self.house,
            spawn: self.spawn,
            obstacle_chance: self.obstacle_chance,
            tree_vs_rock_ratio: self.tree_vs_rock_ratio,
            noise: self.noise,
        }
    }
}
