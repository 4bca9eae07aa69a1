use std::sync::Arc;

use crate::bot::controller::MoveController;
use crate::bot::pathfinding::{NavGrid, Path, Pathfinder};
use crate::client::events::{EventCollector, EventHandler, WorldEvent};
use crate::config::WorldConfig;
use crate::error::{Error, Result};
use crate::mapgen::{CellState, Rect, Seed, Terrain, TerrainConfig, TerrainGenerator};
use crate::state::autotile::{AutotileCache, Connections};
use crate::state::checksum::GridChecksum;
use crate::state::grid::{CellChange, Grid};
use crate::state::object::{ObjectId, ObjectRegistry, ObjectRole, ObjectSource, PlacedObject};

/// The client-side world: grid, placed objects, and the layers derived
/// from them.
///
/// Every cell write goes through `Grid::set`, so the pathfinding index and
/// autotile cache observe all of them.
#[derive(Debug)]
pub struct GameWorld {
    /// Resolved world seed
    pub seed: u32,

    config: WorldConfig,
    grid: Grid,
    objects: ObjectRegistry,
    autotile: Arc<AutotileCache>,
    pathfinder: Pathfinder,
    events: EventCollector,

    /// Counter for locally built object ids
    next_local_id: u64,
}

impl GameWorld {
    /// Generate terrain for `seed` and build the world on it
    pub fn generate(seed: &Seed, config: WorldConfig) -> Result<Self> {
        let generator = TerrainGenerator::new(config.terrain())?;
        let terrain = generator.generate(seed);
        Self::from_terrain(seed.value(), config, &terrain)
    }

    /// Build on already-generated terrain; its obstacles become `terrain`
    /// objects.
    pub fn from_terrain(seed: u32, config: WorldConfig, terrain: &Terrain) -> Result<Self> {
        config.validate()?;
        if terrain.size != config.map_size {
            return Err(violation(
                -1,
                -1,
                format!("terrain is {} wide, config expects {}", terrain.size, config.map_size),
            ));
        }

        let mut objects = ObjectRegistry::new();
        for placement in &terrain.obstacles {
            let object = PlacedObject::from_terrain(placement.x, placement.y, placement.kind);
            if let Err(object) = objects.insert(object) {
                return Err(Error::CellOccupied {
                    x: object.x,
                    y: object.y,
                    occupant: object.id,
                });
            }
        }

        let grid = Grid::from_terrain(terrain);
        let world = Self::assemble(seed, config, grid, objects);
        tracing::info!(
            seed,
            size = world.grid.size(),
            water = world.grid.count(CellState::Water),
            objects = world.objects.len(),
            "world loaded"
        );
        Ok(world)
    }

    /// All-empty world with no objects.
    pub fn blank(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let grid = Grid::new(config.map_size)?;
        Ok(Self::assemble(0, config, grid, ObjectRegistry::new()))
    }

    fn assemble(seed: u32, config: WorldConfig, mut grid: Grid, objects: ObjectRegistry) -> Self {
        let nav = Arc::new(NavGrid::new());
        let autotile = Arc::new(AutotileCache::new());
        grid.attach(nav.clone());
        grid.attach(autotile.clone());

        let mut events = EventCollector::new();
        events.on_event(WorldEvent::WorldLoaded {
            size: grid.size(),
            seed,
            objects: objects.len(),
        });

        Self {
            seed,
            pathfinder: Pathfinder::new(nav, config.pathfinding),
            config,
            grid,
            objects,
            autotile,
            events,
            next_local_id: 1,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    /// Fresh mover sharing this world's pathfinding index
    pub fn move_controller(&self) -> MoveController {
        MoveController::new(self.pathfinder.clone())
    }

    pub fn house(&self) -> Rect {
        self.config.house
    }

    pub fn is_in_house(&self, x: i32, y: i32) -> bool {
        self.config.house.contains(x, y)
    }

    pub fn cell(&self, x: i32, y: i32) -> CellState {
        self.grid.get(x, y)
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.grid.is_walkable(x, y)
    }

    pub fn water_connections(&self, x: i32, y: i32) -> Option<Connections> {
        self.autotile.water_connections(&self.grid, x, y)
    }

    pub fn checksum(&self) -> u32 {
        GridChecksum::of(&self.grid)
    }

    pub async fn find_path(&self, start: (i32, i32), goal: (i32, i32)) -> Option<Path> {
        self.pathfinder.find_path(start, goal).await
    }

    /// Write terrain directly, outside of object placement.
    ///
    /// The house only ever holds `Empty` and the spawn zone never holds
    /// water. Obstacles always belong to an object, so they go through
    /// `build` or `place_object`, and a cell holding an object can only be
    /// changed by removing that object first.
    pub fn set_cell(&mut self, x: i32, y: i32, state: CellState) -> Result<Option<CellChange>> {
        if self.is_in_house(x, y) && state != CellState::Empty {
            tracing::warn!(x, y, ?state, "rejected write inside the house");
            return Err(Error::ProtectedCell { x, y });
        }
        if self.config.spawn.contains(x, y) && state == CellState::Water {
            tracing::warn!(x, y, "rejected water inside the spawn zone");
            return Err(Error::ProtectedCell { x, y });
        }
        if state == CellState::Obstacle {
            tracing::warn!(x, y, "rejected obstacle without an owning object");
            return Err(Error::UnownedObstacle { x, y });
        }
        if let Some(object) = self.objects.at(x, y) {
            if self.grid.get(x, y) != state {
                tracing::warn!(x, y, ?state, occupant = %object.id, "rejected write under an object");
                return Err(Error::CellOccupied { x, y, occupant: object.id.clone() });
            }
        }
        self.write_cell(x, y, state)
    }

    fn write_cell(&mut self, x: i32, y: i32, state: CellState) -> Result<Option<CellChange>> {
        let change = self.grid.set(x, y, state)?;
        if let Some(change) = change {
            tracing::debug!(x, y, old = ?change.old, new = ?change.new, "cell changed");
            self.events.on_event(WorldEvent::CellChanged {
                x,
                y,
                old: change.old,
                new: change.new,
            });
        }
        Ok(change)
    }

    /// Check that `object` could be placed, without placing it.
    pub fn check_placement(&self, object: &PlacedObject) -> Result<()> {
        let (x, y) = object.position();
        if !self.grid.in_bounds(x, y) {
            return Err(Error::OutOfBounds { x, y, size: self.grid.size() });
        }
        if object.role.is_blocking() && self.is_in_house(x, y) {
            return Err(Error::ProtectedCell { x, y });
        }
        if self.objects.contains(&object.id) {
            return Err(Error::CellOccupied { x, y, occupant: object.id.clone() });
        }
        if let Some(existing) = self.objects.at(x, y) {
            return Err(Error::CellOccupied { x, y, occupant: existing.id.clone() });
        }
        match self.grid.get(x, y) {
            CellState::Empty => Ok(()),
            CellState::Water => Err(Error::CellOccupied { x, y, occupant: "water".into() }),
            CellState::Obstacle => Err(Error::CellOccupied { x, y, occupant: "obstacle".into() }),
        }
    }

    /// Place an object, blocking its cell if it is an obstacle
    pub fn place_object(&mut self, object: PlacedObject) -> Result<()> {
        self.check_placement(&object)?;
        let (x, y) = object.position();
        let role = object.role;
        let event = WorldEvent::ObjectPlaced {
            id: object.id.clone(),
            asset: object.asset.clone(),
            role,
            source: object.source,
            x,
            y,
        };
        if let Err(object) = self.objects.insert(object) {
            return Err(Error::CellOccupied { x, y, occupant: object.id });
        }
        self.events.on_event(event);
        if role.is_blocking() {
            self.write_cell(x, y, CellState::Obstacle)?;
        }
        Ok(())
    }

    /// Remove an object by id, freeing its cell
    pub fn remove_object(&mut self, id: &str) -> Result<PlacedObject> {
        let object = self
            .objects
            .remove(id)
            .ok_or_else(|| Error::UnknownObject(id.to_string()))?;
        self.events.on_event(WorldEvent::ObjectRemoved {
            id: object.id.clone(),
            x: object.x,
            y: object.y,
        });
        if object.role.is_blocking() {
            self.write_cell(object.x, object.y, CellState::Empty)?;
        }
        Ok(object)
    }

    /// Player build: a new `local` object at `(x, y)`. Returns its id.
    pub fn build(&mut self, x: i32, y: i32, asset: &str, role: ObjectRole) -> Result<ObjectId> {
        let id = format!("local_{}_{}_{}_{}", asset, x, y, self.next_local_id);
        let object = PlacedObject::new(id.clone(), asset, role, x, y, ObjectSource::Local);
        self.place_object(object)?;
        self.next_local_id += 1;
        Ok(id)
    }

    /// Player harvest: remove whatever object stands at `(x, y)`.
    pub fn harvest(&mut self, x: i32, y: i32) -> Result<PlacedObject> {
        let id = match self.objects.at(x, y) {
            Some(object) => object.id.clone(),
            None => return Err(Error::UnknownObject(format!("nothing to harvest at ({}, {})", x, y))),
        };
        self.remove_object(&id)
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        self.events.drain()
    }

    pub(crate) fn record_event(&mut self, event: WorldEvent) {
        self.events.on_event(event);
    }

    /// Verify grid, pathfinding index and object registry agree.
    pub fn check_consistency(&self) -> Result<()> {
        let size = self.grid.size();
        for y in 0..size {
            for x in 0..size {
                let state = self.grid.get(x, y);
                if self.pathfinder.is_walkable(x, y) != state.is_walkable() {
                    return Err(violation(x, y, format!("pathfinder disagrees with {:?}", state)));
                }
                if self.is_in_house(x, y) && state != CellState::Empty {
                    return Err(violation(x, y, format!("house cell is {:?}", state)));
                }
                let blocking_object = self
                    .objects
                    .at(x, y)
                    .map(|o| o.role.is_blocking())
                    .unwrap_or(false);
                if (state == CellState::Obstacle) != blocking_object {
                    return Err(violation(
                        x,
                        y,
                        format!("cell is {:?} but blocking object present = {}", state, blocking_object),
                    ));
                }
            }
        }
        for object in self.objects.iter() {
            if !self.grid.in_bounds(object.x, object.y) {
                return Err(violation(object.x, object.y, format!("{} is off the grid", object.id)));
            }
            if self.grid.get(object.x, object.y) == CellState::Water {
                return Err(violation(object.x, object.y, format!("{} stands in water", object.id)));
            }
        }
        Ok(())
    }
}

fn violation(x: i32, y: i32, detail: String) -> Error {
    Error::ConsistencyViolation { x, y, detail }
}

/// Generate terrain on tokio's blocking pool.
pub async fn generate_terrain_in_background(seed: Seed, config: TerrainConfig) -> Result<Terrain> {
    let generator = TerrainGenerator::new(config)?;
    tokio::task::spawn_blocking(move || generator.generate(&seed))
        .await
        .map_err(|e| Error::Io(format!("terrain generation task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapgen::ObstacleKind;

    fn small_config() -> WorldConfig {
        WorldConfig {
            map_size: 30,
            house: Rect::new(10, 10, 4, 4),
            spawn: Rect::new(0, 0, 3, 3),
            ..WorldConfig::default()
        }
    }

    #[test]
    fn test_generated_world_is_consistent() {
        let world = GameWorld::generate(&Seed::from("HAVEN"), small_config()).unwrap();
        world.check_consistency().unwrap();
        let terrain_objects = world
            .objects()
            .iter()
            .filter(|o| o.source == ObjectSource::Terrain)
            .count();
        assert_eq!(terrain_objects, world.grid().count(CellState::Obstacle));
    }

    #[test]
    fn test_same_seed_same_checksum() {
        let a = GameWorld::generate(&Seed::from(77u32), small_config()).unwrap();
        let b = GameWorld::generate(&Seed::from("77"), small_config()).unwrap();
        assert_eq!(a.checksum(), b.checksum());
        assert_eq!(a.seed, 77);
    }

    #[test]
    fn test_house_rejects_blocking_states() {
        let mut world = GameWorld::blank(small_config()).unwrap();
        assert!(matches!(
            world.set_cell(11, 11, CellState::Obstacle),
            Err(Error::ProtectedCell { x: 11, y: 11 })
        ));
        assert!(matches!(
            world.set_cell(11, 11, CellState::Water),
            Err(Error::ProtectedCell { .. })
        ));
        assert!(matches!(
            world.build(11, 11, "wall", ObjectRole::Obstacle),
            Err(Error::ProtectedCell { .. })
        ));
        // Floor objects are fine inside the house.
        world.build(11, 11, "rug", ObjectRole::Floor).unwrap();
        assert_eq!(world.cell(11, 11), CellState::Empty);
        world.check_consistency().unwrap();
    }

    #[test]
    fn test_set_cell_keeps_registry_in_step() {
        let mut world = GameWorld::blank(small_config()).unwrap();
        let fence = world.build(4, 4, "fence", ObjectRole::Obstacle).unwrap();
        assert!(matches!(
            world.set_cell(4, 4, CellState::Empty),
            Err(Error::CellOccupied { x: 4, y: 4, ref occupant }) if *occupant == fence
        ));
        assert_eq!(world.cell(4, 4), CellState::Obstacle);
        world.check_consistency().unwrap();

        assert!(matches!(
            world.set_cell(7, 7, CellState::Obstacle),
            Err(Error::UnownedObstacle { x: 7, y: 7 })
        ));
        assert!(world.is_walkable(7, 7));
        world.check_consistency().unwrap();

        world.build(8, 8, "rug", ObjectRole::Floor).unwrap();
        assert!(matches!(
            world.set_cell(8, 8, CellState::Water),
            Err(Error::CellOccupied { x: 8, y: 8, .. })
        ));
        // Rewriting the state already there is a silent no-op.
        assert!(world.set_cell(8, 8, CellState::Empty).unwrap().is_none());
        world.check_consistency().unwrap();

        world.harvest(4, 4).unwrap();
        world.harvest(8, 8).unwrap();
        world.set_cell(8, 8, CellState::Water).unwrap();
        world.check_consistency().unwrap();
    }

    #[test]
    fn test_spawn_rejects_water() {
        let mut world = GameWorld::blank(small_config()).unwrap();
        assert!(world.set_cell(1, 1, CellState::Water).is_err());
        world.set_cell(5, 5, CellState::Water).unwrap();
        assert!(world.grid().is_water(5, 5));
    }

    #[test]
    fn test_build_and_harvest_update_pathfinding() {
        let mut world = GameWorld::blank(small_config()).unwrap();
        let id = world.build(4, 4, "fence", ObjectRole::Obstacle).unwrap();
        assert_eq!(world.cell(4, 4), CellState::Obstacle);
        assert!(!world.pathfinder().is_walkable(4, 4));
        world.check_consistency().unwrap();

        assert!(matches!(
            world.build(4, 4, "fence", ObjectRole::Obstacle),
            Err(Error::CellOccupied { .. })
        ));

        let removed = world.harvest(4, 4).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(world.cell(4, 4), CellState::Empty);
        assert!(world.pathfinder().is_walkable(4, 4));
        world.check_consistency().unwrap();

        assert!(matches!(world.harvest(4, 4), Err(Error::UnknownObject(_))));
    }

    #[test]
    fn test_events_follow_mutations() {
        let mut world = GameWorld::blank(small_config()).unwrap();
        let loaded = world.drain_events();
        assert!(matches!(loaded[..], [WorldEvent::WorldLoaded { size: 30, .. }]));

        world.build(6, 6, "stone_wall", ObjectRole::Obstacle).unwrap();
        let events = world.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WorldEvent::ObjectPlaced { x: 6, y: 6, .. }));
        assert_eq!(
            events[1],
            WorldEvent::CellChanged { x: 6, y: 6, old: CellState::Empty, new: CellState::Obstacle }
        );

        // Same-state writes are silent.
        world.set_cell(6, 7, CellState::Empty).unwrap();
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn test_objects_never_land_in_water() {
        let mut world = GameWorld::blank(small_config()).unwrap();
        world.set_cell(8, 8, CellState::Water).unwrap();
        let object = PlacedObject::new("r9", "rock", ObjectRole::Obstacle, 8, 8, ObjectSource::Server);
        assert!(matches!(
            world.place_object(object),
            Err(Error::CellOccupied { .. })
        ));
        assert!(world.objects().is_empty());
    }

    #[test]
    fn test_autotile_follows_edits() {
        let mut world = GameWorld::blank(small_config()).unwrap();
        world.set_cell(20, 20, CellState::Water).unwrap();
        assert_eq!(world.water_connections(20, 20), Some(Connections::empty()));
        world.set_cell(21, 20, CellState::Water).unwrap();
        assert_eq!(world.water_connections(20, 20), Some(Connections::EAST));
        assert_eq!(world.water_connections(21, 20), Some(Connections::WEST));
        world.set_cell(21, 20, CellState::Empty).unwrap();
        assert_eq!(world.water_connections(20, 20), Some(Connections::empty()));
    }

    #[test]
    fn test_terrain_size_mismatch_rejected() {
        let terrain = TerrainGenerator::new(TerrainConfig { map_size: 12, ..TerrainConfig::default() })
            .unwrap()
            .generate(&Seed::default());
        assert!(GameWorld::from_terrain(42, small_config(), &terrain).is_err());
    }

    #[test]
    fn test_terrain_objects_are_harvestable() {
        let config = WorldConfig { obstacle_chance: 0.3, ..small_config() };
        let mut world = GameWorld::generate(&Seed::from(9u32), config).unwrap();
        let first = world.objects().iter().next().cloned().unwrap();
        assert!(matches!(first.asset.as_str(), "tree" | "rock"));
        let expected_kind = if first.asset == "tree" { ObstacleKind::Tree } else { ObstacleKind::Rock };
        assert_eq!(first.id, PlacedObject::from_terrain(first.x, first.y, expected_kind).id);

        world.harvest(first.x, first.y).unwrap();
        assert!(world.is_walkable(first.x, first.y));
        world.check_consistency().unwrap();
    }

    #[tokio::test]
    async fn test_world_path_after_build() {
        let mut world = GameWorld::blank(small_config()).unwrap();
        for y in 0..29 {
            world.build(5, y, "fence", ObjectRole::Obstacle).unwrap();
        }
        let path = world.find_path((2, 2), (8, 2)).await.unwrap();
        assert!(path.steps().contains(&(5, 29)));
        assert!(world.find_path((0, 0), (0, 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_background_generation_matches() {
        let config = small_config().terrain();
        let seed = Seed::from("bg");
        let background = generate_terrain_in_background(seed.clone(), config.clone()).await.unwrap();
        let direct = TerrainGenerator::new(config).unwrap().generate(&seed);
        assert_eq!(background, direct);
    }
}
