use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::mapgen::{CellState, ConfigError, Terrain, MAX_MAP_SIZE};

/// One effective cell write, as seen by observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChange {
    pub x: i32,
    pub y: i32,
    pub old: CellState,
    pub new: CellState,
}

impl CellChange {
    /// True when either side of the change is water.
    pub fn touches_water(&self) -> bool {
        self.old == CellState::Water || self.new == CellState::Water
    }

    pub fn walkability_changed(&self) -> bool {
        self.old.is_walkable() != self.new.is_walkable()
    }
}

/// Derived layer kept in step with the grid.
///
/// `on_attach` runs once with the full grid when the observer is registered;
/// after that every effective `Grid::set` reaches `on_cell_changed`.
pub trait GridObserver: Send + Sync {
    fn on_attach(&self, grid: &Grid);
    fn on_cell_changed(&self, grid: &Grid, change: &CellChange);
}

/// Square cell matrix, the single source of truth for terrain state
pub struct Grid {
    size: i32,
    /// Row-major, `cells[y * size + x]`.
    cells: Vec<CellState>,
    observers: Vec<Arc<dyn GridObserver>>,
}

impl Grid {
    /// All-empty grid. `size` must be in `1..=MAX_MAP_SIZE`.
    pub fn new(size: i32) -> Result<Self> {
        if size <= 0 || size > MAX_MAP_SIZE {
            return Err(Error::Config(ConfigError::InvalidMapSize { size }));
        }
        Ok(Self {
            size,
            cells: vec![CellState::Empty; (size as usize) * (size as usize)],
            observers: Vec::new(),
        })
    }

    pub fn from_terrain(terrain: &Terrain) -> Self {
        Self {
            size: terrain.size,
            cells: terrain.cells.clone(),
            observers: Vec::new(),
        }
    }

    /// Build from a row matrix. Rows must all be `rows.len()` long.
    pub fn from_rows(rows: &[Vec<CellState>]) -> Result<Self> {
        let size = rows.len() as i32;
        let mut grid = Self::new(size)?;
        for (y, row) in rows.iter().enumerate() {
            if row.len() != rows.len() {
                return Err(Error::OutOfBounds { x: row.len() as i32, y: y as i32, size });
            }
            let start = y * rows.len();
            grid.cells[start..start + row.len()].copy_from_slice(row);
        }
        Ok(grid)
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.size && y < self.size
    }

    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.size + x) as usize
    }

    /// Cell state; out-of-range coordinates read as `Obstacle`.
    pub fn get(&self, x: i32, y: i32) -> CellState {
        self.try_get(x, y).unwrap_or(CellState::Obstacle)
    }

    pub fn try_get(&self, x: i32, y: i32) -> Option<CellState> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some(self.cells[self.index(x, y)])
    }

    /// Write a cell and notify observers.
    ///
    /// Returns `Ok(None)` when the cell already held `state`; observers are
    /// not called in that case.
    pub fn set(&mut self, x: i32, y: i32, state: CellState) -> Result<Option<CellChange>> {
        if !self.in_bounds(x, y) {
            return Err(Error::OutOfBounds { x, y, size: self.size });
        }
        let idx = self.index(x, y);
        let old = self.cells[idx];
        if old == state {
            return Ok(None);
        }
        self.cells[idx] = state;

        let change = CellChange { x, y, old, new: state };
        let this = &*self;
        for observer in &this.observers {
            observer.on_cell_changed(this, &change);
        }
        Ok(Some(change))
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.get(x, y).is_walkable()
    }

    pub fn is_water(&self, x: i32, y: i32) -> bool {
        self.get(x, y) == CellState::Water
    }

    pub fn is_obstacle(&self, x: i32, y: i32) -> bool {
        self.try_get(x, y) == Some(CellState::Obstacle)
    }

    /// Register an observer and index it against the current cells.
    pub fn attach(&mut self, observer: Arc<dyn GridObserver>) {
        observer.on_attach(self);
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellState]> {
        self.cells.chunks(self.size as usize)
    }

    pub fn to_rows(&self) -> Vec<Vec<CellState>> {
        self.rows().map(|r| r.to_vec()).collect()
    }

    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|c| **c == state).count()
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("size", &self.size)
            .field("water", &self.count(CellState::Water))
            .field("obstacles", &self.count(CellState::Obstacle))
            .field("observers", &self.observers.len())
            .finish()
    }
}
