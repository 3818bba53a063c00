//! Scan aggregation and scoring
//!
//! [`Results`] is the per-job aggregation record, [`score_batch`] the pure
//! block counting that runs on the worker pool, and [`finalize`] the
//! once-only owning-context step that turns raw totals into a level.

pub mod finalize;
pub mod results;
pub mod scanner;

pub use finalize::{finalize, FinalizeInputs};
pub use results::{Bucket, Results, ScanState};
pub use scanner::{score_batch, ChunkScanState};

use crate::config::DeathMode;
use crate::world::{OwnerId, Region, WorldId};

/// Death statistics collaborator
pub trait PlayerStats: Send + Sync {
    fn deaths_of(&self, world: &WorldId, owner: &OwnerId) -> u32;
}

/// Stats source reporting zero deaths for everyone
pub struct NoStats;

impl PlayerStats for NoStats {
    fn deaths_of(&self, _world: &WorldId, _owner: &OwnerId) -> u32 {
        0
    }
}

/// Death count for a region under the configured mode
pub fn death_count(stats: &dyn PlayerStats, mode: DeathMode, region: &Region) -> i64 {
    match mode {
        DeathMode::Owner => stats.deaths_of(&region.world, &region.owner) as i64,
        DeathMode::Team => {
            let mut total = stats.deaths_of(&region.world, &region.owner) as i64;
            for member in &region.members {
                if member != &region.owner {
                    total += stats.deaths_of(&region.world, member) as i64;
                }
            }
            total
        }
    }
}
