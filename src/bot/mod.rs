pub mod controller;
pub mod pathfinding;

pub use controller::{Direction, MoveController, PathRequest};
pub use pathfinding::{NavGrid, Path, PathOutcome, PathSearch, Pathfinder, SearchStatus};
