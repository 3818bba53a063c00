use crate::world::{BlockState, CellPos, ChunkPos, CHUNK_SIZE};

/// Immutable deep copy of one chunk column, captured on the owning context.
///
/// This is the only world data that crosses into the worker pool. The grid
/// is laid out column-major over the configured height range so a scan can
/// walk it without touching the live world.
#[derive(Debug, Clone)]
pub struct ChunkSnapshot {
    pos: ChunkPos,
    min_y: i32,
    max_y: i32,
    cells: Vec<BlockState>,
}

impl ChunkSnapshot {
    /// Capture a snapshot by sampling `lookup` for every cell in the
    /// height range. `lookup` receives world coordinates. An inverted
    /// range yields an empty snapshot.
    pub fn capture<F>(pos: ChunkPos, min_y: i32, max_y: i32, mut lookup: F) -> Self
    where
        F: FnMut(CellPos) -> BlockState,
    {
        let height = (max_y - min_y + 1).max(0) as usize;
        let (base_x, base_z) = pos.min_corner();

        let mut cells = Vec::with_capacity((CHUNK_SIZE * CHUNK_SIZE) as usize * height);
        for lx in 0..CHUNK_SIZE {
            for lz in 0..CHUNK_SIZE {
                for y in min_y..=max_y {
                    cells.push(lookup(CellPos::new(base_x + lx, y, base_z + lz)));
                }
            }
        }

        Self {
            pos,
            min_y,
            max_y,
            cells,
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    pub fn max_y(&self) -> i32 {
        self.max_y
    }

    /// Get the captured state at local (x, z) and world y
    pub fn get(&self, local_x: u32, y: i32, local_z: u32) -> BlockState {
        if y < self.min_y || y > self.max_y {
            return BlockState::default();
        }
        let height = (self.max_y - self.min_y + 1) as usize;
        let index = (local_x as usize * CHUNK_SIZE as usize + local_z as usize) * height
            + (y - self.min_y) as usize;
        self.cells.get(index).copied().unwrap_or_default()
    }

    /// Iterate every captured cell with its world position
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellPos, BlockState)> + '_ {
        let (base_x, base_z) = self.pos.min_corner();
        let height = (self.max_y - self.min_y + 1) as i32;
        self.cells.iter().enumerate().map(move |(i, state)| {
            let i = i as i32;
            let y = self.min_y + i % height;
            let lz = (i / height) % CHUNK_SIZE;
            let lx = i / height / CHUNK_SIZE;
            (CellPos::new(base_x + lx, y, base_z + lz), *state)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::BlockId;

    #[test]
    fn test_capture_and_get_round_trip() {
        let snapshot = ChunkSnapshot::capture(ChunkPos::new(0, 0), 0, 3, |pos| {
            if pos.y == 2 && pos.x == 5 && pos.z == 9 {
                BlockState::new(BlockId(3))
            } else {
                BlockState::default()
            }
        });

        assert_eq!(snapshot.get(5, 2, 9), BlockState::new(BlockId(3)));
        assert!(snapshot.get(5, 3, 9).is_empty());
        // Out of height range reads as empty
        assert!(snapshot.get(5, 40, 9).is_empty());
    }

    #[test]
    fn test_iter_cells_matches_get() {
        let snapshot = ChunkSnapshot::capture(ChunkPos::new(-1, 2), -2, 5, |pos| {
            BlockState::with_variant(BlockId((pos.y + 2) as u16), 1)
        });

        for (pos, state) in snapshot.iter_cells() {
            let (lx, lz) = pos.to_local_pos();
            assert_eq!(snapshot.get(lx, pos.y, lz), state);
            assert_eq!(state.id, BlockId((pos.y + 2) as u16));
        }
    }
}
