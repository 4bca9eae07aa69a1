//! Seeded terrain generation: water from noise, obstacles from LCG rolls
//!
//! Cells in the house and spawn rectangles are skipped before any sampling,
//! so protected zones never consume random draws and never receive water or
//! obstacles.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::perlin::PerlinNoise;
use crate::rng::{Lcg, STREAM_OBSTACLE_KIND, STREAM_OBSTACLE_PLACEMENT};
use crate::seed::Seed;

/// Largest accepted map side. Keeps `size * size` allocations sane.
pub const MAX_MAP_SIZE: i32 = 4096;

/// Classification of a single grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    #[default]
    Empty,
    Obstacle,
    Water,
}

impl CellState {
    pub fn is_walkable(self) -> bool {
        self == CellState::Empty
    }

    /// Compact code used by the wire/debug formats (0 empty, 1 obstacle, 2 water)
    pub fn code(self) -> u8 {
        match self {
            CellState::Empty => 0,
            CellState::Obstacle => 1,
            CellState::Water => 2,
        }
    }
}

/// Axis-aligned grid rectangle, `x..x+w` by `y..y+h`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    #[serde(alias = "width")]
    pub w: i32,
    #[serde(alias = "height")]
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

/// Noise sampling parameters for water placement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Coordinate multiplier; 0.04 gives blobs roughly 25 cells across.
    pub scale: f64,
    /// Cells whose normalized noise falls below this become water.
    pub water_threshold: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            scale: 0.04,
            water_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub map_size: i32,
    pub house: Rect,
    pub spawn: Rect,
    pub obstacle_chance: f64,
    /// Share of obstacles that become rocks; the rest are trees.
    pub tree_vs_rock_ratio: f64,
    pub noise: NoiseParams,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            map_size: 100,
            house: Rect::new(15, 15, 6, 6),
            spawn: Rect::new(0, 0, 5, 5),
            obstacle_chance: 0.15,
            tree_vs_rock_ratio: 0.5,
            noise: NoiseParams::default(),
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_size <= 0 || self.map_size > MAX_MAP_SIZE {
            return Err(ConfigError::InvalidMapSize { size: self.map_size });
        }
        if self.noise.scale == 0.0 || !self.noise.scale.is_finite() {
            return Err(ConfigError::InvalidNoiseScale(self.noise.scale));
        }
        if !self.noise.water_threshold.is_finite() {
            return Err(ConfigError::InvalidWaterThreshold(self.noise.water_threshold));
        }
        check_probability("obstacle_chance", self.obstacle_chance)?;
        check_probability("tree_vs_rock_ratio", self.tree_vs_rock_ratio)?;
        check_rect("house", &self.house)?;
        check_rect("spawn", &self.spawn)?;
        Ok(())
    }

    /// True for cells no generator may touch.
    pub fn is_protected(&self, x: i32, y: i32) -> bool {
        self.house.contains(x, y) || self.spawn.contains(x, y)
    }
}

fn check_probability(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ProbabilityOutOfRange { field, value });
    }
    Ok(())
}

fn check_rect(name: &'static str, rect: &Rect) -> Result<(), ConfigError> {
    if rect.w < 0 || rect.h < 0 {
        return Err(ConfigError::InvalidRect { name, w: rect.w, h: rect.h });
    }
    Ok(())
}

/// Rendered subtype of a generated obstacle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObstacleKind {
    Tree,
    Rock,
}

impl ObstacleKind {
    pub fn asset(self) -> &'static str {
        match self {
            ObstacleKind::Tree => "tree",
            ObstacleKind::Rock => "rock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstaclePlacement {
    pub x: i32,
    pub y: i32,
    pub kind: ObstacleKind,
}

/// Generated cell matrix plus the obstacle list for the object layer
#[derive(Debug, Clone, PartialEq)]
pub struct Terrain {
    pub size: i32,
    /// Row-major, `cells[y * size + x]`.
    pub cells: Vec<CellState>,
    pub obstacles: Vec<ObstaclePlacement>,
}

impl Terrain {
    fn empty(size: i32) -> Self {
        let side = size as usize;
        Self {
            size,
            cells: vec![CellState::Empty; side * side],
            obstacles: Vec::new(),
        }
    }

    pub fn get(&self, x: i32, y: i32) -> Option<CellState> {
        if x < 0 || y < 0 || x >= self.size || y >= self.size {
            return None;
        }
        Some(self.cells[(y * self.size + x) as usize])
    }

    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|c| **c == state).count()
    }
}

/// Validated generator; one per config, reusable across seeds
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    config: TerrainConfig,
}

impl TerrainGenerator {
    pub fn new(config: TerrainConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Generate the whole map in one call
    pub fn generate(&self, seed: &Seed) -> Terrain {
        let terrain = self.start(seed).finish();
        tracing::debug!(
            seed = %seed,
            size = terrain.size,
            water = terrain.count(CellState::Water),
            obstacles = terrain.obstacles.len(),
            "generated terrain"
        );
        terrain
    }

    /// Begin row-by-row generation, for spreading work across frames
    pub fn start(&self, seed: &Seed) -> TerrainJob<'_> {
        let value = seed.value();
        TerrainJob {
            config: &self.config,
            noise: PerlinNoise::new(value),
            placement: Lcg::for_stream(value, STREAM_OBSTACLE_PLACEMENT),
            kind: Lcg::for_stream(value, STREAM_OBSTACLE_KIND),
            next_row: 0,
            terrain: Terrain::empty(self.config.map_size),
        }
    }
}

/// In-progress generation.
///
/// Water depends only on the cell's own noise sample, so generating water
/// and obstacles row by row draws the obstacle streams in exactly the same
/// row-major order as a full water pass followed by a full obstacle pass.
pub struct TerrainJob<'a> {
    config: &'a TerrainConfig,
    noise: PerlinNoise,
    placement: Lcg,
    kind: Lcg,
    next_row: i32,
    terrain: Terrain,
}

impl TerrainJob<'_> {
    /// Generate up to `max_rows` more rows. Returns true once every row is done.
    pub fn advance(&mut self, max_rows: usize) -> bool {
        let mut budget = max_rows;
        while budget > 0 && !self.is_finished() {
            self.generate_row(self.next_row);
            self.next_row += 1;
            budget -= 1;
        }
        self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        self.next_row >= self.terrain.size
    }

    pub fn rows_done(&self) -> usize {
        self.next_row as usize
    }

    /// Run any remaining rows and hand back the terrain
    pub fn finish(mut self) -> Terrain {
        while !self.is_finished() {
            self.generate_row(self.next_row);
            self.next_row += 1;
        }
        self.terrain
    }

    fn generate_row(&mut self, y: i32) {
        let size = self.terrain.size;
        let scale = self.config.noise.scale;
        let threshold = self.config.noise.water_threshold;

        for x in 0..size {
            if self.config.is_protected(x, y) {
                continue;
            }
            let idx = (y * size + x) as usize;

            let n = self.noise.normalized(x as f64 * scale, y as f64 * scale);
            if n < threshold {
                self.terrain.cells[idx] = CellState::Water;
                continue;
            }

            if self.placement.chance(self.config.obstacle_chance) {
                self.terrain.cells[idx] = CellState::Obstacle;
                let kind = if self.kind.next_f64() > self.config.tree_vs_rock_ratio {
                    ObstacleKind::Tree
                } else {
                    ObstacleKind::Rock
                };
                self.terrain.obstacles.push(ObstaclePlacement { x, y, kind });
            }
        }
    }
}
