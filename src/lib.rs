pub mod config;
pub mod equation;
pub mod levels;
pub mod persistence;
pub mod pipeline;
pub mod scoring;
pub mod values;
pub mod world;

use anyhow::Result;
use std::sync::Arc;

pub use config::{DeathMode, PipelineConfig, ScoringConfig, DEFAULT_FORMULA};
pub use levels::{AllowAll, LevelNotifier, LevelRecord, LevelsManager, PermissionCheck};
pub use persistence::{FileLevelStore, LevelStore, MemoryLevelStore};
pub use pipeline::{Pipeliner, PipelineStats, ScanHandle};
pub use scoring::{Bucket, NoStats, PlayerStats, Results, ScanState};
pub use values::{Valuation, ValueTable};
pub use world::{
    Area, BlockId, BlockRegistry, BlockState, CellPos, ChunkPos, ChunkSnapshot, GridWorld,
    OwnerId, Region, RegionDirectory, RegionId, RegionProvider, WorldAccess, WorldId,
};

/// The assembled scoring pipeline: value table, scheduler and manager
/// wired together from one configuration.
///
/// The embedding loop owns the driving thread: call
/// [`tick`](ScoringEngine::tick) periodically from the thread that owns
/// world access.
pub struct ScoringEngine {
    table: Arc<ValueTable>,
    pipeliner: Arc<Pipeliner>,
    manager: Arc<LevelsManager>,
}

impl ScoringEngine {
    pub fn new(
        mut config: ScoringConfig,
        regions: Arc<dyn RegionProvider>,
        stats: Arc<dyn PlayerStats>,
        store: Arc<dyn LevelStore>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Result<Self> {
        config.sanitize();
        let table = Arc::new(ValueTable::from_config(&config));
        let pipeliner = Arc::new(Pipeliner::new(
            Arc::clone(&table),
            Arc::clone(&regions),
            stats,
            config.pipeline.clone(),
        )?);
        let manager = Arc::new(LevelsManager::new(
            Arc::clone(&pipeliner),
            regions,
            store,
            permissions,
        ));

        Ok(Self {
            table,
            pipeliner,
            manager,
        })
    }

    pub fn table(&self) -> &Arc<ValueTable> {
        &self.table
    }

    pub fn pipeliner(&self) -> &Arc<Pipeliner> {
        &self.pipeliner
    }

    pub fn manager(&self) -> &Arc<LevelsManager> {
        &self.manager
    }

    /// Drive the scheduler one step on the owning context
    pub fn tick(&self, world: &dyn WorldAccess) {
        self.pipeliner.tick(world);
    }
}
