use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap;

use crate::bot::controller::Direction;
use crate::config::PathfindingConfig;
use crate::state::grid::{CellChange, Grid, GridObserver};

const SQRT2: f64 = std::f64::consts::SQRT_2;
// Octile distance: diagonal steps cost sqrt(2) instead of 2.
const OCTILE_DIAG_COEFF: f64 = SQRT2 - 2.0;

/// Ordered steps from the start (excluded) to the goal (included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    steps: Vec<(i32, i32)>,
}

impl Path {
    /// Already at the goal.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[(i32, i32)] {
        &self.steps
    }

    pub fn goal(&self) -> Option<(i32, i32)> {
        self.steps.last().copied()
    }

    pub fn into_steps(self) -> Vec<(i32, i32)> {
        self.steps
    }

    /// Facing for each step, walking from `start`
    pub fn facings(&self, start: (i32, i32)) -> Vec<Direction> {
        let mut prev = start;
        self.steps
            .iter()
            .filter_map(|&step| {
                let facing = Direction::of_step(prev, step);
                prev = step;
                facing
            })
            .collect()
    }

    /// Total movement cost (1 per straight step, sqrt 2 per diagonal).
    pub fn cost_from(&self, start: (i32, i32)) -> f64 {
        let mut prev = start;
        let mut cost = 0.0;
        for &step in &self.steps {
            cost += if step.0 != prev.0 && step.1 != prev.1 { SQRT2 } else { 1.0 };
            prev = step;
        }
        cost
    }
}

#[derive(Debug, Default)]
struct NavState {
    size: i32,
    walkable: Vec<bool>,
    revision: u64,
}

impl NavState {
    fn is_walkable(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.size || y >= self.size {
            return false;
        }
        self.walkable[(y * self.size + x) as usize]
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.size && y < self.size
    }
}

/// Walkability mirror of the grid, read by path searches.
///
/// Attached to the grid as an observer, so it is rebuilt on attach and
/// patched on every cell change.
#[derive(Debug, Default)]
pub struct NavGrid {
    state: RwLock<NavState>,
}

impl NavGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, NavState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, NavState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Rebuild every flag from the grid
    pub fn reindex(&self, grid: &Grid) {
        let mut state = self.write();
        state.size = grid.size();
        state.walkable = grid.cells().iter().map(|c| c.is_walkable()).collect();
        state.revision += 1;
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.read().is_walkable(x, y)
    }

    pub fn size(&self) -> i32 {
        self.read().size
    }

    /// Bumped whenever any walkability flag changes.
    pub fn revision(&self) -> u64 {
        self.read().revision
    }
}

impl GridObserver for NavGrid {
    fn on_attach(&self, grid: &Grid) {
        self.reindex(grid);
    }

    fn on_cell_changed(&self, _grid: &Grid, change: &CellChange) {
        if !change.walkability_changed() {
            return;
        }
        let mut state = self.write();
        if !state.in_bounds(change.x, change.y) {
            return;
        }
        let idx = (change.y * state.size + change.x) as usize;
        state.walkable[idx] = change.new.is_walkable();
        state.revision += 1;
        tracing::trace!(x = change.x, y = change.y, walkable = state.walkable[idx], "nav cell updated");
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    pos: (i32, i32),
    g: f64,
    f: f64,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.g == other.g && self.pos == other.pos
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse for min-heap behavior.
        other
            .f
            .partial_cmp(&self.f)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.g.partial_cmp(&self.g).unwrap_or(Ordering::Equal))
    }
}

/// Progress report from one slice of a search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchStatus {
    /// Budget spent, call `step` again.
    Pending,
    Found(Path),
    NoPath,
}

/// Resumable A* over a `NavGrid`.
///
/// Eight neighbors, octile heuristic, and no diagonal step unless both
/// orthogonal cells it passes are walkable. If the grid changes between
/// slices the search starts over from `start` on the new grid; nodes
/// expanded before the change still count against `max_expanded`.
pub struct PathSearch {
    start: (i32, i32),
    goal: (i32, i32),
    /// `NavGrid` revision the open set was built against
    revision: u64,
    open: BinaryHeap<Node>,
    came_from: AHashMap<(i32, i32), (i32, i32)>,
    g_score: AHashMap<(i32, i32), f64>,
    expanded: usize,
    max_expanded: usize,
    finished: Option<SearchStatus>,
}

impl PathSearch {
    pub fn new(nav: &NavGrid, start: (i32, i32), goal: (i32, i32), max_expanded: usize) -> Self {
        let mut search = Self {
            start,
            goal,
            revision: 0,
            open: BinaryHeap::new(),
            came_from: AHashMap::new(),
            g_score: AHashMap::new(),
            expanded: 0,
            max_expanded,
            finished: None,
        };
        search.reset(&nav.read());
        search
    }

    fn reset(&mut self, state: &NavState) {
        self.revision = state.revision;
        self.open.clear();
        self.came_from.clear();
        self.g_score.clear();

        if !state.in_bounds(self.start.0, self.start.1) {
            self.finished = Some(SearchStatus::NoPath);
        } else if self.start == self.goal {
            self.finished = Some(SearchStatus::Found(Path::empty()));
        } else if !state.is_walkable(self.goal.0, self.goal.1) {
            self.finished = Some(SearchStatus::NoPath);
        } else {
            self.g_score.insert(self.start, 0.0);
            self.open.push(Node {
                pos: self.start,
                g: 0.0,
                f: octile_heuristic(self.start, self.goal),
            });
        }
    }

    pub fn expanded(&self) -> usize {
        self.expanded
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Expand at most `budget` nodes.
    pub fn step(&mut self, nav: &NavGrid, budget: usize) -> SearchStatus {
        if let Some(status) = &self.finished {
            return status.clone();
        }
        let state = nav.read();
        if state.revision != self.revision {
            tracing::debug!(
                start = ?self.start,
                goal = ?self.goal,
                revision = state.revision,
                "grid changed mid-search, restarting"
            );
            self.reset(&state);
            if let Some(status) = &self.finished {
                return status.clone();
            }
        }
        let status = self.run_slice(&state, budget);
        if status != SearchStatus::Pending {
            self.finished = Some(status.clone());
        }
        status
    }

    fn run_slice(&mut self, nav: &NavState, budget: usize) -> SearchStatus {
        let mut spent = 0usize;
        while let Some(current) = self.open.pop() {
            if current.pos == self.goal {
                return SearchStatus::Found(self.reconstruct_path());
            }

            let best_g = match self.g_score.get(&current.pos) {
                Some(v) => *v,
                None => continue,
            };
            if current.g > best_g {
                continue;
            }

            self.expanded += 1;
            if self.expanded > self.max_expanded {
                tracing::debug!(
                    start = ?self.start,
                    goal = ?self.goal,
                    expanded = self.expanded,
                    "path search gave up"
                );
                return SearchStatus::NoPath;
            }

            for (next, step_cost) in neighbors(current.pos) {
                let dx = next.0 - current.pos.0;
                let dy = next.1 - current.pos.1;
                if dx != 0 && dy != 0 {
                    // Prevent cutting across blocked corners.
                    if !nav.is_walkable(current.pos.0 + dx, current.pos.1)
                        || !nav.is_walkable(current.pos.0, current.pos.1 + dy)
                    {
                        continue;
                    }
                }
                if !nav.is_walkable(next.0, next.1) {
                    continue;
                }

                let tentative_g = current.g + step_cost;
                let is_better = match self.g_score.get(&next) {
                    Some(score) => tentative_g < *score,
                    None => true,
                };
                if is_better {
                    self.came_from.insert(next, current.pos);
                    self.g_score.insert(next, tentative_g);
                    let f = tentative_g + octile_heuristic(next, self.goal);
                    self.open.push(Node { pos: next, g: tentative_g, f });
                }
            }

            spent += 1;
            if spent >= budget {
                return SearchStatus::Pending;
            }
        }

        SearchStatus::NoPath
    }

    fn reconstruct_path(&self) -> Path {
        let mut steps = Vec::new();
        let mut current = self.goal;
        while current != self.start {
            steps.push(current);
            match self.came_from.get(&current) {
                Some(prev) => current = *prev,
                None => break,
            }
        }
        steps.reverse();
        Path { steps }
    }
}

/// Outcome of a cancellable search
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Found(Path),
    NoPath,
    /// A newer request replaced this one before it finished.
    Superseded,
}

impl PathOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            PathOutcome::Found(p) => Some(p),
            _ => None,
        }
    }
}

/// Query front end over the shared walkability index
#[derive(Debug, Clone)]
pub struct Pathfinder {
    nav: Arc<NavGrid>,
    config: PathfindingConfig,
}

impl Pathfinder {
    pub fn new(nav: Arc<NavGrid>, config: PathfindingConfig) -> Self {
        Self { nav, config }
    }

    pub fn nav(&self) -> &Arc<NavGrid> {
        &self.nav
    }

    pub fn config(&self) -> &PathfindingConfig {
        &self.config
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.nav.is_walkable(x, y)
    }

    /// Full rebuild from the grid, for callers that bypassed observation.
    pub fn update_grid(&self, grid: &Grid) {
        self.nav.reindex(grid);
    }

    pub fn search(&self, start: (i32, i32), goal: (i32, i32)) -> PathSearch {
        PathSearch::new(&self.nav, start, goal, self.config.max_expanded)
    }

    /// Run a search to completion on the calling thread.
    pub fn find_path_blocking(&self, start: (i32, i32), goal: (i32, i32)) -> Option<Path> {
        let mut search = self.search(start, goal);
        loop {
            match search.step(&self.nav, usize::MAX) {
                SearchStatus::Pending => continue,
                SearchStatus::Found(path) => return Some(path),
                SearchStatus::NoPath => return None,
            }
        }
    }

    /// Time-sliced search; yields to the runtime between slices.
    pub async fn find_path(&self, start: (i32, i32), goal: (i32, i32)) -> Option<Path> {
        match self.find_path_while(start, goal, || true).await {
            PathOutcome::Found(path) => Some(path),
            PathOutcome::NoPath | PathOutcome::Superseded => None,
        }
    }

    /// Time-sliced search that stops at the first slice boundary where
    /// `is_current` returns false.
    pub async fn find_path_while(
        &self,
        start: (i32, i32),
        goal: (i32, i32),
        is_current: impl Fn() -> bool,
    ) -> PathOutcome {
        let mut search = self.search(start, goal);
        let budget = self.config.iterations_per_slice.max(1);
        loop {
            if !is_current() {
                return PathOutcome::Superseded;
            }
            match search.step(&self.nav, budget) {
                SearchStatus::Pending => tokio::task::yield_now().await,
                SearchStatus::Found(path) => return PathOutcome::Found(path),
                SearchStatus::NoPath => return PathOutcome::NoPath,
            }
        }
    }
}

fn octile_heuristic(a: (i32, i32), b: (i32, i32)) -> f64 {
    let dx = (a.0 - b.0).abs() as f64;
    let dy = (a.1 - b.1).abs() as f64;
    let min = dx.min(dy);
    (dx + dy) + OCTILE_DIAG_COEFF * min
}

fn neighbors(pos: (i32, i32)) -> [((i32, i32), f64); 8] {
    let (x, y) = pos;
    [
        ((x, y - 1), 1.0),
        ((x + 1, y - 1), SQRT2),
        ((x + 1, y), 1.0),
        ((x + 1, y + 1), SQRT2),
        ((x, y + 1), 1.0),
        ((x - 1, y + 1), SQRT2),
        ((x - 1, y), 1.0),
        ((x - 1, y - 1), SQRT2),
    ]
}
