use serde::{Deserialize, Serialize};

/// Edge length of one scannable chunk column, in cells.
pub const CHUNK_SIZE: i32 = 16;

/// Position of a chunk column in the world (chunk coordinates, 2-D)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World coordinate of the chunk's minimum corner
    pub fn min_corner(&self) -> (i32, i32) {
        (self.x * CHUNK_SIZE, self.z * CHUNK_SIZE)
    }

    /// Chunk containing the given world column
    pub fn containing(x: i32, z: i32) -> Self {
        Self {
            x: x.div_euclid(CHUNK_SIZE),
            z: z.div_euclid(CHUNK_SIZE),
        }
    }
}

/// Position of a cell in the world (world coordinates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl CellPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Get the chunk column this cell belongs to
    pub fn to_chunk_pos(&self) -> ChunkPos {
        ChunkPos::containing(self.x, self.z)
    }

    /// Get local (x, z) position within the chunk column
    pub fn to_local_pos(&self) -> (u32, u32) {
        (
            self.x.rem_euclid(CHUNK_SIZE) as u32,
            self.z.rem_euclid(CHUNK_SIZE) as u32,
        )
    }
}

/// Axis-aligned area in world coordinates (inclusive bounds, y ignored)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

impl Area {
    pub fn new(min_x: i32, min_z: i32, max_x: i32, max_z: i32) -> Self {
        Self {
            min_x,
            min_z,
            max_x,
            max_z,
        }
    }

    pub fn contains(&self, x: i32, z: i32) -> bool {
        x >= self.min_x && x <= self.max_x && z >= self.min_z && z <= self.max_z
    }

    /// Chunk columns covering this area, rounded outward to chunk granularity
    pub fn covering_chunks(&self) -> Vec<ChunkPos> {
        let min = ChunkPos::containing(self.min_x, self.min_z);
        let max = ChunkPos::containing(self.max_x, self.max_z);

        let mut chunks =
            Vec::with_capacity(((max.x - min.x + 1) * (max.z - min.z + 1)).max(0) as usize);
        for cx in min.x..=max.x {
            for cz in min.z..=max.z {
                chunks.push(ChunkPos::new(cx, cz));
            }
        }
        chunks
    }
}
