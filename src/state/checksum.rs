use crc32fast::Hasher;

use crate::error::{Error, Result};
use crate::mapgen::{CellState, Terrain};
use crate::state::grid::Grid;

/// CRC-32 over a grid's size and cell codes.
///
/// A client and a server that generated the same world from the same seed
/// and config produce the same value.
pub struct GridChecksum {
    hasher: Hasher,
}

impl GridChecksum {
    pub fn new(size: i32) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(&size.to_le_bytes());
        Self { hasher }
    }

    pub fn update(&mut self, cells: &[CellState]) {
        for cell in cells {
            self.hasher.update(&[cell.code()]);
        }
    }

    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }

    pub fn of(grid: &Grid) -> u32 {
        let mut sum = Self::new(grid.size());
        sum.update(grid.cells());
        sum.finalize()
    }

    pub fn of_terrain(terrain: &Terrain) -> u32 {
        let mut sum = Self::new(terrain.size);
        sum.update(&terrain.cells);
        sum.finalize()
    }

    /// Compare against a checksum reported by the other side
    pub fn verify(grid: &Grid, remote: u32) -> Result<()> {
        let local = Self::of(grid);
        if local != remote {
            return Err(Error::ConsistencyViolation {
                x: -1,
                y: -1,
                detail: format!("grid checksum {:#010x} does not match remote {:#010x}", local, remote),
            });
        }
        Ok(())
    }
}
