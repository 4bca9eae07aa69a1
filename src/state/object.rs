use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::mapgen::ObstacleKind;

/// Placed-object identifier, shared with the server snapshot
pub type ObjectId = String;

/// Whether an object blocks its cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectRole {
    /// Cell becomes `Obstacle` while the object stands.
    Obstacle,
    /// Walkable decoration; the cell stays `Empty`.
    Floor,
}

impl ObjectRole {
    pub fn is_blocking(self) -> bool {
        self == ObjectRole::Obstacle
    }
}

/// Who put the object there
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectSource {
    Terrain,
    Local,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedObject {
    pub id: ObjectId,
    pub asset: String,
    pub role: ObjectRole,
    pub x: i32,
    pub y: i32,
    pub source: ObjectSource,
}

impl PlacedObject {
    pub fn new(
        id: impl Into<ObjectId>,
        asset: impl Into<String>,
        role: ObjectRole,
        x: i32,
        y: i32,
        source: ObjectSource,
    ) -> Self {
        Self {
            id: id.into(),
            asset: asset.into(),
            role,
            x,
            y,
            source,
        }
    }

    /// Record for a generated tree or rock. Ids are positional so a
    /// regenerated world reproduces them.
    pub fn from_terrain(x: i32, y: i32, kind: ObstacleKind) -> Self {
        Self::new(
            format!("terrain_{}_{}_{}", kind.asset(), x, y),
            kind.asset(),
            ObjectRole::Obstacle,
            x,
            y,
            ObjectSource::Terrain,
        )
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }
}

/// Objects keyed by id (in insertion order) and by cell.
///
/// At most one object occupies a cell. The registry only tracks records; the
/// world keeps grid cells in step with it.
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    objects: IndexMap<ObjectId, PlacedObject>,
    occupancy: AHashMap<(i32, i32), ObjectId>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&PlacedObject> {
        self.objects.get(id)
    }

    pub fn at(&self, x: i32, y: i32) -> Option<&PlacedObject> {
        self.occupancy.get(&(x, y)).and_then(|id| self.objects.get(id))
    }

    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        self.occupancy.contains_key(&(x, y))
    }

    /// Insert a record. Returns the record back if its id or cell is taken.
    pub fn insert(&mut self, object: PlacedObject) -> std::result::Result<(), PlacedObject> {
        if self.objects.contains_key(&object.id) || self.is_occupied(object.x, object.y) {
            return Err(object);
        }
        self.occupancy.insert(object.position(), object.id.clone());
        self.objects.insert(object.id.clone(), object);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<PlacedObject> {
        let object = self.objects.shift_remove(id)?;
        self.occupancy.remove(&object.position());
        Some(object)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedObject> {
        self.objects.values()
    }

    pub fn ids_from(&self, source: ObjectSource) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|o| o.source == source)
            .map(|o| o.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rock(id: &str, x: i32, y: i32) -> PlacedObject {
        PlacedObject::new(id, "rock", ObjectRole::Obstacle, x, y, ObjectSource::Server)
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = ObjectRegistry::new();
        registry.insert(rock("r1", 3, 4)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.at(3, 4).map(|o| o.id.as_str()), Some("r1"));
        assert!(registry.contains("r1"));
        assert!(registry.at(4, 3).is_none());
    }

    #[test]
    fn test_one_object_per_cell() {
        let mut registry = ObjectRegistry::new();
        registry.insert(rock("r1", 1, 1)).unwrap();
        let rejected = registry.insert(rock("r2", 1, 1)).unwrap_err();
        assert_eq!(rejected.id, "r2");
        let rejected = registry.insert(rock("r1", 2, 2)).unwrap_err();
        assert_eq!(rejected.position(), (2, 2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_releases_cell() {
        let mut registry = ObjectRegistry::new();
        registry.insert(rock("r1", 1, 1)).unwrap();
        let removed = registry.remove("r1").unwrap();
        assert_eq!(removed.position(), (1, 1));
        assert!(!registry.is_occupied(1, 1));
        assert!(registry.remove("r1").is_none());
        registry.insert(rock("r2", 1, 1)).unwrap();
    }

    #[test]
    fn test_insertion_order_and_source_filter() {
        let mut registry = ObjectRegistry::new();
        registry.insert(rock("b", 0, 0)).unwrap();
        registry.insert(PlacedObject::from_terrain(1, 0, ObstacleKind::Tree)).unwrap();
        registry.insert(rock("a", 2, 0)).unwrap();
        let ids: Vec<_> = registry.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "terrain_tree_1_0", "a"]);
        assert_eq!(registry.ids_from(ObjectSource::Server), vec!["b", "a"]);
    }
}
