use crate::world::{BlockState, CellPos, ChunkPos, ChunkSnapshot, Region, WorldId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// World read access consumed by the pipeline.
///
/// All calls happen on the owning context. `snapshot` must load the chunk
/// first if it is not resident and may release it afterward; the returned
/// copy is the only thing handed to workers.
pub trait WorldAccess: Send + Sync {
    /// Chunk columns covering the region's protected area, rounded outward
    fn chunks_covering(&self, region: &Region) -> Vec<ChunkPos> {
        region.protected.covering_chunks()
    }

    /// Capture an immutable snapshot of one chunk column over the given
    /// inclusive height range. Implementations clamp the range to the
    /// world's own build height.
    fn snapshot(&self, world: &WorldId, pos: ChunkPos, min_y: i32, max_y: i32) -> ChunkSnapshot;
}

/// In-memory sparse world keyed by world name, used by tests and demos.
pub struct GridWorld {
    cells: DashMap<(WorldId, CellPos), BlockState>,
    min_y: i32,
    max_y: i32,
    snapshots_taken: AtomicU64,
}

impl GridWorld {
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self {
            cells: DashMap::new(),
            min_y,
            max_y,
            snapshots_taken: AtomicU64::new(0),
        }
    }

    pub fn set_block(&self, world: &WorldId, pos: CellPos, state: BlockState) {
        if state.is_empty() {
            self.cells.remove(&(world.clone(), pos));
        } else {
            self.cells.insert((world.clone(), pos), state);
        }
    }

    pub fn get_block(&self, world: &WorldId, pos: CellPos) -> BlockState {
        self.cells
            .get(&(world.clone(), pos))
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Fill an inclusive box with one block state
    pub fn fill(
        &self,
        world: &WorldId,
        min: CellPos,
        max: CellPos,
        state: BlockState,
    ) {
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    self.set_block(world, CellPos::new(x, y, z), state);
                }
            }
        }
    }

    /// Number of snapshots captured so far
    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken.load(Ordering::Relaxed)
    }
}

impl WorldAccess for GridWorld {
    fn snapshot(&self, world: &WorldId, pos: ChunkPos, min_y: i32, max_y: i32) -> ChunkSnapshot {
        self.snapshots_taken.fetch_add(1, Ordering::Relaxed);
        let min_y = min_y.max(self.min_y);
        let max_y = max_y.min(self.max_y);
        ChunkSnapshot::capture(pos, min_y, max_y, |cell| self.get_block(world, cell))
    }
}
