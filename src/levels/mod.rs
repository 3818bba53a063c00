//! Level records, ranking cache and the levels manager
//!
//! The manager is the inbound surface of the pipeline: calculate-level
//! requests, cached level reads, top-ten and rank queries.

pub mod hooks;
pub mod manager;
pub mod ranking;
pub mod record;

pub use hooks::{Interceptors, PostCalcHook, PreCalcHook};
pub use manager::{LevelNotifier, LevelsManager};
pub use ranking::RankingTable;
pub use record::LevelRecord;

use crate::world::{OwnerId, WorldId};

/// Ranking-inclusion permission collaborator
pub trait PermissionCheck: Send + Sync {
    fn has_ranking_permission(&self, world: &WorldId, owner: &OwnerId) -> bool;
}

/// Permission source that includes everyone
pub struct AllowAll;

impl PermissionCheck for AllowAll {
    fn has_ranking_permission(&self, _world: &WorldId, _owner: &OwnerId) -> bool {
        true
    }
}
