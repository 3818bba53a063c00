use crate::world::{OwnerId, WorldId};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Per-world leaderboard cache: owner id → level.
///
/// Entries are only trusted after filtering: an entry is valid while its
/// owner still owns a region in the world and holds the ranking-inclusion
/// permission. Stale entries are pruned lazily on read, never eagerly.
pub struct RankingTable {
    worlds: Mutex<HashMap<WorldId, HashMap<OwnerId, i64>>>,
}

impl RankingTable {
    pub fn new() -> Self {
        Self {
            worlds: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, world: &WorldId, owner: OwnerId, level: i64) {
        self.worlds
            .lock()
            .entry(world.clone())
            .or_default()
            .insert(owner, level);
    }

    pub fn remove(&self, world: &WorldId, owner: &OwnerId) {
        if let Some(table) = self.worlds.lock().get_mut(world) {
            table.remove(owner);
        }
    }

    /// Top `n` valid entries, descending by level. Invalid entries found
    /// on the way are dropped from the cache.
    pub fn top_n<F>(&self, world: &WorldId, n: usize, valid: F) -> Vec<(OwnerId, i64)>
    where
        F: Fn(&OwnerId) -> bool,
    {
        let mut sorted = self.pruned_sorted(world, valid);
        sorted.truncate(n);
        sorted
    }

    /// 1-based position of `owner` under the same filter and order;
    /// table length + 1 when absent
    pub fn rank<F>(&self, world: &WorldId, owner: &OwnerId, valid: F) -> usize
    where
        F: Fn(&OwnerId) -> bool,
    {
        let sorted = self.pruned_sorted(world, valid);
        sorted
            .iter()
            .position(|(entry, _)| entry == owner)
            .map(|index| index + 1)
            .unwrap_or(sorted.len() + 1)
    }

    fn pruned_sorted<F>(&self, world: &WorldId, valid: F) -> Vec<(OwnerId, i64)>
    where
        F: Fn(&OwnerId) -> bool,
    {
        let mut worlds = self.worlds.lock();
        let table = match worlds.get_mut(world) {
            Some(table) => table,
            None => return Vec::new(),
        };
        table.retain(|owner, _| valid(owner));

        let mut sorted: Vec<(OwnerId, i64)> =
            table.iter().map(|(owner, level)| (*owner, *level)).collect();
        // Ties break on owner id so repeated reads return an identical order
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted
    }
}

impl Default for RankingTable {
    fn default() -> Self {
        Self::new()
    }
}
