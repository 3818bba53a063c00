use crate::world::Area;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a world (one scoring dimension / leaderboard namespace)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(pub String);

impl WorldId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a player (region owner or member)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// Identifier of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region-{}", self.0)
    }
}

/// A bounded in-world area with an owner, members, and a protected sub-area
/// defining the scan boundary. Owned by the world model; the scoring
/// pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub world: WorldId,
    pub owner: OwnerId,
    pub members: Vec<OwnerId>,
    /// Protected area; scanning covers the chunks overlapping it
    pub protected: Area,
    /// Static handicap subtracted from the computed level
    pub handicap: i64,
}

impl Region {
    pub fn new(id: RegionId, world: WorldId, owner: OwnerId, protected: Area) -> Self {
        Self {
            id,
            world,
            owner,
            members: Vec::new(),
            protected,
            handicap: 0,
        }
    }
}

/// Read access to the current region set.
///
/// Answers "is this region still present and owned" at admission and at
/// every batch boundary, and resolves an owner back to their region for
/// leaderboard reads.
pub trait RegionProvider: Send + Sync {
    /// Current state of the region, or `None` when deleted/unowned
    fn lookup(&self, id: RegionId) -> Option<Region>;

    /// Region currently owned by `owner` in `world`, if any
    fn region_of(&self, world: &WorldId, owner: &OwnerId) -> Option<Region>;
}

/// In-memory region directory, used by tests and embedders without a
/// full world model.
pub struct RegionDirectory {
    regions: RwLock<HashMap<RegionId, Region>>,
}

impl RegionDirectory {
    pub fn new() -> Self {
        Self {
            regions: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, region: Region) {
        self.regions.write().insert(region.id, region);
    }

    pub fn remove(&self, id: RegionId) -> Option<Region> {
        self.regions.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.regions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.read().is_empty()
    }
}

impl Default for RegionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionProvider for RegionDirectory {
    fn lookup(&self, id: RegionId) -> Option<Region> {
        self.regions.read().get(&id).cloned()
    }

    fn region_of(&self, world: &WorldId, owner: &OwnerId) -> Option<Region> {
        self.regions
            .read()
            .values()
            .find(|r| &r.world == world && &r.owner == owner)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_lookup_and_remove() {
        let dir = RegionDirectory::new();
        let region = Region::new(
            RegionId(1),
            WorldId::new("overworld"),
            OwnerId(7),
            Area::new(0, 0, 15, 15),
        );
        dir.insert(region.clone());

        assert_eq!(dir.lookup(RegionId(1)), Some(region.clone()));
        assert_eq!(
            dir.region_of(&WorldId::new("overworld"), &OwnerId(7)),
            Some(region)
        );

        dir.remove(RegionId(1));
        assert_eq!(dir.lookup(RegionId(1)), None);
    }
}
