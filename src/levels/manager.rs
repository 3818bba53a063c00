use crate::levels::{
    Interceptors, LevelRecord, PermissionCheck, PostCalcHook, PreCalcHook, RankingTable,
};
use crate::persistence::LevelStore;
use crate::pipeline::{CompletionCallback, Pipeliner, ScanHandle};
use crate::scoring::ScanState;
use crate::world::{OwnerId, Region, RegionId, RegionProvider, WorldId};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Notified after a completed calculation changes a region's level.
/// Message content and templating live outside this core.
pub trait LevelNotifier: Send + Sync {
    fn level_changed(&self, requester: &OwnerId, region: &Region, level: i64);
}

/// Orchestrates calculate-level requests, persists per-region level
/// records, and maintains the per-world ranking cache.
///
/// The record cache is authoritative for reads within the process
/// lifetime; every mutation schedules an asynchronous persistence write.
pub struct LevelsManager {
    pipeliner: Arc<Pipeliner>,
    core: Arc<LevelsCore>,
}

/// Shared state the completion callback needs after the manager handle
/// itself is out of reach
struct LevelsCore {
    regions: Arc<dyn RegionProvider>,
    store: Arc<dyn LevelStore>,
    permissions: Arc<dyn PermissionCheck>,
    cache: DashMap<RegionId, LevelRecord>,
    ranking: RankingTable,
    interceptors: RwLock<Interceptors>,
    notifier: RwLock<Option<Box<dyn LevelNotifier>>>,
}

impl LevelsManager {
    pub fn new(
        pipeliner: Arc<Pipeliner>,
        regions: Arc<dyn RegionProvider>,
        store: Arc<dyn LevelStore>,
        permissions: Arc<dyn PermissionCheck>,
    ) -> Self {
        Self {
            pipeliner,
            core: Arc::new(LevelsCore {
                regions,
                store,
                permissions,
                cache: DashMap::new(),
                ranking: RankingTable::new(),
                interceptors: RwLock::new(Interceptors::default()),
                notifier: RwLock::new(None),
            }),
        }
    }

    pub fn add_pre_calc(&self, hook: PreCalcHook) {
        self.core.interceptors.write().add_pre_calc(hook);
    }

    pub fn add_post_calc(&self, hook: PostCalcHook) {
        self.core.interceptors.write().add_post_calc(hook);
    }

    pub fn set_notifier(&self, notifier: Box<dyn LevelNotifier>) {
        *self.core.notifier.write() = Some(notifier);
    }

    /// Request a scan for `region` on behalf of `requester`.
    ///
    /// Pre-calc interceptors may veto (the handle resolves `None`).
    /// On completion the post-calc interceptors run, the level record is
    /// persisted, the ranking cache updates, and the notifier fires, all
    /// synchronously on the owning context.
    pub fn calculate_level(&self, requester: OwnerId, region: &Region) -> ScanHandle {
        if !self.core.interceptors.read().allow(&requester, region) {
            return ScanHandle::resolved(None);
        }

        let initial_level = self.core.record_for(region.id).initial_level;
        let core = Arc::clone(&self.core);
        let callback: CompletionCallback = Box::new(move |region, results| {
            let results = match results {
                Some(results) => results,
                // Benign cancellation; nothing is persisted
                None => return,
            };
            core.interceptors.read().apply_overrides(region, results);
            if results.state() != ScanState::Available {
                // Timeout: callers see "still processing", nothing persists
                return;
            }
            core.commit(&requester, region, results);
        });

        self.pipeliner
            .submit_with(region, initial_level, Some(callback))
    }

    /// Cached level for the owner's region; zero when none exists yet.
    /// Never triggers a scan.
    pub fn island_level(&self, world: &WorldId, owner: &OwnerId) -> i64 {
        let region = match self.core.regions.region_of(world, owner) {
            Some(region) => region,
            None => return 0,
        };
        if let Some(record) = self.core.cache.get(&region.id) {
            return record.level;
        }
        match self.core.store.load(region.id) {
            Ok(Some(record)) => {
                let level = record.level;
                self.core.cache.insert(region.id, record);
                level
            }
            Ok(None) => 0,
            Err(err) => {
                log::warn!("failed to load record for {}: {}", region.id, err);
                0
            }
        }
    }

    /// Top `n` leaderboard entries for `world`, descending by level.
    /// Entries whose owner lost the inclusion permission or their region
    /// are pruned on the way.
    pub fn top_ten(&self, world: &WorldId, n: usize) -> Vec<(OwnerId, i64)> {
        self.core
            .ranking
            .top_n(world, n, |owner| self.core.ranking_valid(world, owner))
    }

    /// 1-based leaderboard position under the same filter and order
    pub fn rank(&self, world: &WorldId, owner: &OwnerId) -> usize {
        self.core
            .ranking
            .rank(world, owner, |entry| self.core.ranking_valid(world, entry))
    }

    /// Record the level a region starts at; subtracted from every
    /// subsequent calculation
    pub fn set_initial_level(&self, region: &Region, level: i64) {
        let mut record = self.core.record_for(region.id);
        record.initial_level = level;
        self.core.cache.insert(region.id, record.clone());
        self.core.store.save_async(record);
    }

    /// Drop all state for a deleted region
    pub fn delete_region(&self, region: &Region) {
        self.core.cache.remove(&region.id);
        self.core.ranking.remove(&region.world, &region.owner);
        if let Err(err) = self.core.store.delete(region.id) {
            log::warn!("failed to delete record for {}: {}", region.id, err);
        }
    }
}

impl LevelsCore {
    fn ranking_valid(&self, world: &WorldId, owner: &OwnerId) -> bool {
        self.permissions.has_ranking_permission(world, owner)
            && self.regions.region_of(world, owner).is_some()
    }

    /// Cached record, loaded from the store or created lazily
    fn record_for(&self, id: RegionId) -> LevelRecord {
        if let Some(record) = self.cache.get(&id) {
            return record.clone();
        }
        let record = match self.store.load(id) {
            Ok(Some(record)) => record,
            Ok(None) => LevelRecord::new(id),
            Err(err) => {
                log::warn!("failed to load record for {}: {}", id, err);
                LevelRecord::new(id)
            }
        };
        self.cache.insert(id, record.clone());
        record
    }

    /// Apply a completed calculation: update the record, the ranking
    /// cache, and tell the requester
    fn commit(&self, requester: &OwnerId, region: &Region, results: &crate::scoring::Results) {
        let mut record = self.record_for(region.id);
        record.level = results.level();
        record.max_level = record.max_level.max(results.level());
        record.points_to_next_level = results.points_to_next_level();
        record.total_points = results.total_points();
        self.cache.insert(region.id, record.clone());
        self.store.save_async(record);

        self.ranking.set(&region.world, region.owner, results.level());

        if let Some(notifier) = self.notifier.read().as_ref() {
            notifier.level_changed(requester, region, results.level());
        }
    }
}
