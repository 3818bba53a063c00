use crate::world::RegionId;
use serde::{Deserialize, Serialize};

/// Persisted level state for one region.
///
/// Created lazily on first access, updated only by a completed finalize
/// step, removed when the region is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub region: RegionId,
    pub level: i64,
    /// Level of the starting region, subtracted from every computed level
    pub initial_level: i64,
    /// Highest level ever observed for this region
    pub max_level: i64,
    pub points_to_next_level: i64,
    pub total_points: i64,
}

impl LevelRecord {
    pub fn new(region: RegionId) -> Self {
        Self {
            region,
            level: 0,
            initial_level: 0,
            max_level: 0,
            points_to_next_level: 0,
            total_points: 0,
        }
    }
}
