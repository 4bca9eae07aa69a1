//! Server-side object registry
//!
//! The server owns the list of world resources and broadcasts it to clients
//! as a `WorldSnapshot`. Clients never generate these objects themselves;
//! they receive them through `WorldSynchronizer`.

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::client::sync::{SnapshotObject, WorldSnapshot};
use crate::config::WorldConfig;
use crate::error::{Error, Result};
use crate::mapgen::{Lcg, Rect, Seed, STREAM_RESOURCES};
use crate::state::object::{ObjectId, ObjectRole};

/// Per-cell spawn rule. Rules are checked in order against one cumulative roll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceRule {
    pub asset: &'static str,
    pub role: ObjectRole,
    pub chance: f64,
}

pub const GENERATION_RULES: [ResourceRule; 5] = [
    ResourceRule { asset: "tree", role: ObjectRole::Obstacle, chance: 0.10 },
    ResourceRule { asset: "rock", role: ObjectRole::Obstacle, chance: 0.05 },
    ResourceRule { asset: "cotton_bush", role: ObjectRole::Obstacle, chance: 0.04 },
    ResourceRule { asset: "clay_node", role: ObjectRole::Obstacle, chance: 0.03 },
    ResourceRule { asset: "apple_tree", role: ObjectRole::Obstacle, chance: 0.02 },
];

/// What a harvested asset yields
pub fn harvest_yield(asset: &str) -> &'static str {
    if asset.contains("rock") {
        "stone"
    } else {
        "wood"
    }
}

#[derive(Debug, Clone)]
pub struct AuthoritativeWorld {
    map_size: i32,
    house: Rect,
    spawn: Rect,
    resources: IndexMap<ObjectId, SnapshotObject>,
    index: AHashMap<(i32, i32), ObjectId>,
    next_serial: u64,
}

impl AuthoritativeWorld {
    pub fn empty(config: &WorldConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            map_size: config.map_size,
            house: config.house,
            spawn: config.spawn,
            resources: IndexMap::new(),
            index: AHashMap::new(),
            next_serial: 1,
        })
    }

    /// Populate every unprotected cell from `GENERATION_RULES`, one roll
    /// per cell in row-major order.
    pub fn generate(seed: &Seed, config: &WorldConfig) -> Result<Self> {
        Self::generate_with_rules(seed, config, &GENERATION_RULES)
    }

    pub fn generate_with_rules(seed: &Seed, config: &WorldConfig, rules: &[ResourceRule]) -> Result<Self> {
        let mut world = Self::empty(config)?;
        let mut rng = Lcg::for_stream(seed.value(), STREAM_RESOURCES);

        for y in 0..world.map_size {
            for x in 0..world.map_size {
                if world.is_protected(x, y) {
                    continue;
                }
                let roll = rng.next_f64();
                let mut cumulative = 0.0;
                for rule in rules {
                    cumulative += rule.chance;
                    if roll < cumulative {
                        let object = SnapshotObject::new(
                            format!("{}_{}_{}", rule.asset, x, y),
                            rule.asset,
                            rule.role,
                            x,
                            y,
                        );
                        world.insert(object);
                        break;
                    }
                }
            }
        }

        tracing::info!(
            seed = %seed,
            size = world.map_size,
            resources = world.len(),
            "authoritative world generated"
        );
        Ok(world)
    }

    fn is_protected(&self, x: i32, y: i32) -> bool {
        self.house.contains(x, y) || self.spawn.contains(x, y)
    }

    fn insert(&mut self, object: SnapshotObject) {
        self.index.insert((object.x, object.y), object.id.clone());
        self.resources.insert(object.id.clone(), object);
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SnapshotObject> {
        self.resources.values()
    }

    pub fn resource_at(&self, x: i32, y: i32) -> Option<&SnapshotObject> {
        self.index.get(&(x, y)).and_then(|id| self.resources.get(id))
    }

    /// Harvest: drop whatever stands at `(x, y)`
    pub fn remove_resource_at(&mut self, x: i32, y: i32) -> Option<SnapshotObject> {
        let id = self.index.remove(&(x, y))?;
        self.resources.shift_remove(&id)
    }

    /// Player harvest on the server: removes the resource and reports what
    /// it yields.
    pub fn harvest(&mut self, x: i32, y: i32) -> Option<(SnapshotObject, &'static str)> {
        let object = self.remove_resource_at(x, y)?;
        let item = harvest_yield(&object.asset);
        tracing::debug!(id = %object.id, x, y, item, "resource harvested");
        Some((object, item))
    }

    /// Player build. Fails if the cell is off the map, taken, or a blocking
    /// object would land in the house.
    pub fn add_resource(&mut self, asset: &str, role: ObjectRole, x: i32, y: i32) -> Result<SnapshotObject> {
        if x < 0 || y < 0 || x >= self.map_size || y >= self.map_size {
            return Err(Error::OutOfBounds { x, y, size: self.map_size });
        }
        if role.is_blocking() && self.house.contains(x, y) {
            return Err(Error::ProtectedCell { x, y });
        }
        if let Some(occupant) = self.index.get(&(x, y)) {
            return Err(Error::CellOccupied { x, y, occupant: occupant.clone() });
        }

        let id = format!("{}_{}_{}_{}", asset, x, y, self.next_serial);
        self.next_serial += 1;
        let object = SnapshotObject::new(id, asset, role, x, y);
        self.insert(object.clone());
        tracing::debug!(id = %object.id, x, y, "resource added");
        Ok(object)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::new(self.resources.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::sync::WorldSynchronizer;
    use crate::state::world::GameWorld;

    fn config() -> WorldConfig {
        WorldConfig {
            map_size: 40,
            house: Rect::new(15, 15, 6, 6),
            spawn: Rect::new(0, 0, 5, 5),
            ..WorldConfig::default()
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = AuthoritativeWorld::generate(&Seed::from(42u32), &config()).unwrap();
        let b = AuthoritativeWorld::generate(&Seed::from(42u32), &config()).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());
        let c = AuthoritativeWorld::generate(&Seed::from(43u32), &config()).unwrap();
        assert_ne!(a.snapshot(), c.snapshot());
    }

    #[test]
    fn test_generation_respects_zones_and_density() {
        let config = config();
        let world = AuthoritativeWorld::generate(&Seed::from("server"), &config).unwrap();
        for object in world.iter() {
            assert!(!config.house.contains(object.x, object.y));
            assert!(!config.spawn.contains(object.x, object.y));
            assert_eq!(object.id, format!("{}_{}_{}", object.asset, object.x, object.y));
        }
        // 24% of ~1500 eligible cells, with generous slack.
        let eligible = 40 * 40 - 36 - 25;
        assert!(world.len() > eligible / 10);
        assert!(world.len() < eligible / 2);
        let assets: std::collections::HashSet<_> = world.iter().map(|o| o.asset.as_str()).collect();
        assert!(assets.contains("tree"));
        assert!(assets.contains("rock"));
    }

    #[test]
    fn test_single_rule_fills_everything() {
        let rules = [ResourceRule { asset: "grass", role: ObjectRole::Floor, chance: 1.0 }];
        let world = AuthoritativeWorld::generate_with_rules(&Seed::default(), &config(), &rules).unwrap();
        assert_eq!(world.len(), 40 * 40 - 36 - 25);
    }

    #[test]
    fn test_add_and_remove() {
        let mut world = AuthoritativeWorld::empty(&config()).unwrap();
        let wall = world.add_resource("wall", ObjectRole::Obstacle, 7, 7).unwrap();
        assert_eq!(wall.id, "wall_7_7_1");
        assert_eq!(world.resource_at(7, 7), Some(&wall));

        assert!(matches!(
            world.add_resource("wall", ObjectRole::Obstacle, 7, 7),
            Err(Error::CellOccupied { .. })
        ));
        assert!(matches!(
            world.add_resource("wall", ObjectRole::Obstacle, 16, 16),
            Err(Error::ProtectedCell { .. })
        ));
        assert!(matches!(
            world.add_resource("wall", ObjectRole::Obstacle, 40, 0),
            Err(Error::OutOfBounds { .. })
        ));

        let removed = world.remove_resource_at(7, 7).unwrap();
        assert_eq!(removed.id, "wall_7_7_1");
        assert!(world.remove_resource_at(7, 7).is_none());
        let again = world.add_resource("wall", ObjectRole::Obstacle, 7, 7).unwrap();
        assert_eq!(again.id, "wall_7_7_2");
    }

    #[test]
    fn test_harvest_yield() {
        assert_eq!(harvest_yield("rock"), "stone");
        assert_eq!(harvest_yield("tree"), "wood");
        assert_eq!(harvest_yield("apple_tree"), "wood");

        let mut world = AuthoritativeWorld::empty(&config()).unwrap();
        world.add_resource("rock", ObjectRole::Obstacle, 9, 9).unwrap();
        let (rock, item) = world.harvest(9, 9).unwrap();
        assert_eq!(rock.asset, "rock");
        assert_eq!(item, "stone");
        assert!(world.harvest(9, 9).is_none());
        assert!(world.is_empty());
    }

    #[test]
    fn test_client_follows_server() {
        let config = WorldConfig { obstacle_chance: 0.0, ..config() };
        let mut server = AuthoritativeWorld::generate(&Seed::from(7u32), &config).unwrap();
        let mut client = GameWorld::generate(&Seed::from(7u32), config).unwrap();
        let mut sync = WorldSynchronizer::new();

        let diff = sync.sync(&mut client, &server.snapshot());
        assert_eq!(diff.added.len() + diff.skipped.len(), server.len());
        // Only lakes can reject server objects when terrain obstacles are off.
        assert!(diff.skipped.iter().all(|s| client.grid().is_water(s.x, s.y)));
        client.check_consistency().unwrap();

        // A harvest on the server reaches the client as a removal.
        let id = diff.added[0].clone();
        let target = client.objects().get(&id).cloned().unwrap();
        let removed = server.remove_resource_at(target.x, target.y).unwrap();
        assert_eq!(removed.id, id);
        let diff = sync.apply_removed(&mut client, &removed.id);
        assert_eq!(diff.removed, vec![id]);
        assert!(client.is_walkable(target.x, target.y));

        // Full resync after the harvest changes nothing and repeats no skips.
        assert!(sync.sync(&mut client, &server.snapshot()).is_empty());
        client.check_consistency().unwrap();
    }
}
