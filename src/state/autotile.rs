//! Cardinal-neighbor connectivity for autotiled terrain (water edges)

use std::sync::Mutex;

use bitflags::bitflags;

use crate::mapgen::{CellState, Terrain};
use crate::state::grid::{CellChange, Grid, GridObserver};

bitflags! {
    /// Which cardinal neighbors share the target state. The raw bits are the
    /// tileset index (0..=15).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Connections: u8 {
        const NORTH = 1;
        const EAST = 2;
        const SOUTH = 4;
        const WEST = 8;
    }
}

impl Connections {
    pub fn tile_index(self) -> u8 {
        self.bits()
    }
}

/// Anything the classifier can read cells from.
pub trait CellSource {
    /// `None` outside the source.
    fn cell(&self, x: i32, y: i32) -> Option<CellState>;
}

impl CellSource for Grid {
    fn cell(&self, x: i32, y: i32) -> Option<CellState> {
        self.try_get(x, y)
    }
}

impl CellSource for Terrain {
    fn cell(&self, x: i32, y: i32) -> Option<CellState> {
        self.get(x, y)
    }
}

impl CellSource for [Vec<CellState>] {
    fn cell(&self, x: i32, y: i32) -> Option<CellState> {
        if x < 0 || y < 0 {
            return None;
        }
        self.get(y as usize)?.get(x as usize).copied()
    }
}

/// Bitmask of cardinal neighbors of `(x, y)` equal to `target`.
///
/// Out-of-range neighbors never match and diagonals are ignored. The cell
/// itself is not consulted.
pub fn bitmask<S: CellSource + ?Sized>(src: &S, x: i32, y: i32, target: CellState) -> Connections {
    let mut mask = Connections::empty();
    let sides = [
        (x, y - 1, Connections::NORTH),
        (x + 1, y, Connections::EAST),
        (x, y + 1, Connections::SOUTH),
        (x - 1, y, Connections::WEST),
    ];
    for (nx, ny, bit) in sides {
        if src.cell(nx, ny) == Some(target) {
            mask |= bit;
        }
    }
    mask
}

/// Lazily filled cache of water connectivity, one slot per cell.
///
/// Attach it to the grid: edits that turn a cell into or out of water drop
/// the cached value for that cell and its four neighbors.
#[derive(Debug, Default)]
pub struct AutotileCache {
    inner: Mutex<CacheSlots>,
}

#[derive(Debug, Default)]
struct CacheSlots {
    size: i32,
    slots: Vec<Option<Connections>>,
}

impl CacheSlots {
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.size || y >= self.size {
            return None;
        }
        Some((y * self.size + x) as usize)
    }
}

impl AutotileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Water connectivity of `(x, y)`, or `None` when the cell is not water.
    pub fn water_connections(&self, grid: &Grid, x: i32, y: i32) -> Option<Connections> {
        if !grid.is_water(x, y) {
            return None;
        }
        let Ok(mut cache) = self.inner.lock() else {
            return Some(bitmask(grid, x, y, CellState::Water));
        };
        let Some(idx) = cache.index(x, y) else {
            return Some(bitmask(grid, x, y, CellState::Water));
        };
        if let Some(mask) = cache.slots[idx] {
            return Some(mask);
        }
        let mask = bitmask(grid, x, y, CellState::Water);
        cache.slots[idx] = Some(mask);
        Some(mask)
    }

    pub fn is_cached(&self, x: i32, y: i32) -> bool {
        self.inner
            .lock()
            .ok()
            .and_then(|c| c.index(x, y).map(|i| c.slots[i].is_some()))
            .unwrap_or(false)
    }

    pub fn cached_len(&self) -> usize {
        self.inner
            .lock()
            .map(|c| c.slots.iter().filter(|s| s.is_some()).count())
            .unwrap_or(0)
    }

    fn invalidate_around(&self, x: i32, y: i32) {
        let Ok(mut cache) = self.inner.lock() else {
            return;
        };
        for (cx, cy) in [(x, y), (x, y - 1), (x + 1, y), (x, y + 1), (x - 1, y)] {
            if let Some(idx) = cache.index(cx, cy) {
                cache.slots[idx] = None;
            }
        }
    }
}

impl GridObserver for AutotileCache {
    fn on_attach(&self, grid: &Grid) {
        if let Ok(mut cache) = self.inner.lock() {
            let side = grid.size() as usize;
            cache.size = grid.size();
            cache.slots = vec![None; side * side];
        }
    }

    fn on_cell_changed(&self, _grid: &Grid, change: &CellChange) {
        if change.touches_water() {
            self.invalidate_around(change.x, change.y);
        }
    }
}
