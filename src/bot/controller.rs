use std::sync::atomic::{AtomicU64, Ordering};

use crate::bot::pathfinding::{PathOutcome, Pathfinder};

/// Eight-way facing derived from a path step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// Facing for a single step. Grid north is -Y. `None` for a zero step.
    pub fn of_step(from: (i32, i32), to: (i32, i32)) -> Option<Direction> {
        let dx = (to.0 - from.0).signum();
        let dy = (to.1 - from.1).signum();
        Some(match (dx, dy) {
            (0, -1) => Direction::North,
            (1, -1) => Direction::NorthEast,
            (1, 0) => Direction::East,
            (1, 1) => Direction::SouthEast,
            (0, 1) => Direction::South,
            (-1, 1) => Direction::SouthWest,
            (-1, 0) => Direction::West,
            (-1, -1) => Direction::NorthWest,
            _ => return None,
        })
    }
}

/// Ticket for one movement request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRequest {
    pub id: u64,
    pub start: (i32, i32),
    pub goal: (i32, i32),
}

/// Issues path requests for one mover; the newest request always wins.
#[derive(Debug)]
pub struct MoveController {
    pathfinder: Pathfinder,
    latest: AtomicU64,
}

impl MoveController {
    pub fn new(pathfinder: Pathfinder) -> Self {
        Self {
            pathfinder,
            latest: AtomicU64::new(0),
        }
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    /// Register a new request, superseding every earlier one
    pub fn request(&self, start: (i32, i32), goal: (i32, i32)) -> PathRequest {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(id, ?start, ?goal, "path requested");
        PathRequest { id, start, goal }
    }

    pub fn is_current(&self, request: &PathRequest) -> bool {
        self.latest.load(Ordering::SeqCst) == request.id
    }

    /// Drop whatever request is in flight.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Run a request's search. Stops early with `Superseded` if a newer
    /// request arrives before it finishes.
    pub async fn run(&self, request: PathRequest) -> PathOutcome {
        let outcome = self
            .pathfinder
            .find_path_while(request.start, request.goal, || self.is_current(&request))
            .await;
        if outcome == PathOutcome::Superseded {
            tracing::debug!(id = request.id, "path request superseded");
        }
        outcome
    }

    pub async fn move_to(&self, start: (i32, i32), goal: (i32, i32)) -> PathOutcome {
        let request = self.request(start, goal);
        self.run(request).await
    }
}
