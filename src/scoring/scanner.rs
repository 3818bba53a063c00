use crate::scoring::Results;
use crate::values::{Valuation, ValueTable};
use crate::world::{ChunkPos, ChunkSnapshot, Region};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Per-job scan loop state: the backlog of chunk columns still to capture.
///
/// Lives on the owning context; batches popped from it are captured there
/// and scored on a worker.
#[derive(Debug)]
pub struct ChunkScanState {
    backlog: VecDeque<ChunkPos>,
    total: usize,
}

impl ChunkScanState {
    /// Cover the region's protected area, rounded outward to chunk
    /// granularity.
    pub fn for_region(region: &Region) -> Self {
        let chunks = region.protected.covering_chunks();
        let total = chunks.len();
        Self {
            backlog: chunks.into(),
            total,
        }
    }

    pub fn is_done(&self) -> bool {
        self.backlog.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.backlog.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Pop up to `batch_size` pending coordinates
    pub fn next_batch(&mut self, batch_size: usize) -> Vec<ChunkPos> {
        let take = batch_size.min(self.backlog.len());
        self.backlog.drain(..take).collect()
    }
}

/// Score one batch of captured snapshots into the job's results.
///
/// Pure block counting over immutable copies; this is the only code that
/// runs on the worker pool. The results mutex is held for the whole batch
/// since nothing else mutates the record during the scanning phase.
pub fn score_batch(
    snapshots: &[ChunkSnapshot],
    region: &Region,
    table: &ValueTable,
    results: &Mutex<Results>,
) {
    let sea_height = table.sea_height(&region.world);
    let mut results = results.lock();

    for snapshot in snapshots {
        for (pos, state) in snapshot.iter_cells() {
            if state.is_empty() {
                continue;
            }
            if !region.protected.contains(pos.x, pos.z) {
                continue;
            }

            // Cap check comes first: an exhausted cap scores zero no
            // matter what the value tables say.
            if let Some(limit) = table.limit_of(state.id) {
                if !results.claim_cap_slot(state.id, limit) {
                    results.tally_over_limit(state.id);
                    continue;
                }
            }

            match table.value_of(state, &region.world) {
                Valuation::Value(value) => {
                    if sea_height > 0 && pos.y <= sea_height {
                        results.tally_underwater(state.id, value);
                    } else {
                        results.tally_normal(state.id, value);
                    }
                }
                Valuation::Unconfigured => results.tally_unconfigured(state.id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::scoring::Bucket;
    use crate::world::{
        Area, BlockState, CellPos, GridWorld, OwnerId, RegionId, WorldAccess, WorldId,
    };

    fn test_region(area: Area) -> Region {
        Region::new(RegionId(1), WorldId::new("overworld"), OwnerId(1), area)
    }

    fn test_table(config: &mut ScoringConfig) -> ValueTable {
        config.blocks.insert("stone".to_string(), 1);
        config.blocks.insert("hopper".to_string(), 10);
        config.limits.insert("hopper".to_string(), 5);
        ValueTable::from_config(config)
    }

    #[test]
    fn test_backlog_batches() {
        let region = test_region(Area::new(0, 0, 47, 15));
        let mut scan = ChunkScanState::for_region(&region);
        assert_eq!(scan.total(), 3);

        let batch = scan.next_batch(2);
        assert_eq!(batch.len(), 2);
        assert!(!scan.is_done());
        assert_eq!(scan.next_batch(2).len(), 1);
        assert!(scan.is_done());
    }

    #[test]
    fn test_cap_boundary_across_batches() {
        // limit 5: the 5th occurrence counts normally, the 6th lands in
        // the over-limit bucket at zero value
        let mut config = ScoringConfig::default();
        let table = test_table(&mut config);
        let hopper = table.registry().get_id("hopper").unwrap();

        let world_id = WorldId::new("overworld");
        let world = GridWorld::new(0, 15);
        // Three occurrences in each of two chunks
        for x in [0, 1, 2, 16, 17, 18] {
            world.set_block(&world_id, CellPos::new(x, 0, 0), BlockState::new(hopper));
        }

        let region = test_region(Area::new(0, 0, 31, 15));
        let results = Mutex::new(Results::new());

        // Score as two batches to prove the counter survives the boundary
        for chunk in [ChunkPos::new(0, 0), ChunkPos::new(1, 0)] {
            let snapshot = world.snapshot(&world_id, chunk, 0, 15);
            score_batch(&[snapshot], &region, &table, &results);
        }

        let results = results.into_inner();
        assert_eq!(results.bucket_counts(Bucket::Normal)[&hopper], 5);
        assert_eq!(results.bucket_counts(Bucket::OverLimit)[&hopper], 1);
        assert_eq!(results.raw_total(), 50);
    }

    #[test]
    fn test_cells_outside_protected_area_skipped() {
        let mut config = ScoringConfig::default();
        let table = test_table(&mut config);
        let stone = table.registry().get_id("stone").unwrap();

        let world_id = WorldId::new("overworld");
        let world = GridWorld::new(0, 15);
        world.set_block(&world_id, CellPos::new(3, 0, 3), BlockState::new(stone));
        world.set_block(&world_id, CellPos::new(12, 0, 12), BlockState::new(stone));

        // Protected area covers only part of the chunk
        let region = test_region(Area::new(0, 0, 7, 7));
        let results = Mutex::new(Results::new());
        let snapshot = world.snapshot(&world_id, ChunkPos::new(0, 0), 0, 15);
        score_batch(&[snapshot], &region, &table, &results);

        assert_eq!(results.into_inner().raw_total(), 1);
    }

    #[test]
    fn test_underwater_classification() {
        let mut config = ScoringConfig::default();
        config.sea_height = 5;
        let table = test_table(&mut config);
        let stone = table.registry().get_id("stone").unwrap();

        let world_id = WorldId::new("overworld");
        let world = GridWorld::new(0, 15);
        world.set_block(&world_id, CellPos::new(0, 5, 0), BlockState::new(stone));
        world.set_block(&world_id, CellPos::new(0, 6, 0), BlockState::new(stone));

        let region = test_region(Area::new(0, 0, 15, 15));
        let results = Mutex::new(Results::new());
        let snapshot = world.snapshot(&world_id, ChunkPos::new(0, 0), 0, 15);
        score_batch(&[snapshot], &region, &table, &results);

        let results = results.into_inner();
        assert_eq!(results.underwater_total(), 1);
        assert_eq!(results.raw_total(), 1);
        assert_eq!(results.bucket_counts(Bucket::Underwater)[&stone], 1);
    }

    #[test]
    fn test_unknown_types_are_not_errors() {
        let mut config = ScoringConfig::default();
        let table = test_table(&mut config);

        let world_id = WorldId::new("overworld");
        let world = GridWorld::new(0, 15);
        // An id the table has never seen
        world.set_block(
            &world_id,
            CellPos::new(0, 0, 0),
            BlockState::new(crate::world::BlockId(4000)),
        );

        let region = test_region(Area::new(0, 0, 15, 15));
        let results = Mutex::new(Results::new());
        let snapshot = world.snapshot(&world_id, ChunkPos::new(0, 0), 0, 15);
        score_batch(&[snapshot], &region, &table, &results);

        let results = results.into_inner();
        assert_eq!(results.raw_total(), 0);
        assert_eq!(
            results
                .bucket_counts(Bucket::Unconfigured)
                .values()
                .sum::<u64>(),
            1
        );
    }
}
