//! Spatial model consumed by the scoring pipeline
//!
//! Regions, chunk coordinates, block identities and immutable chunk
//! snapshots. The pipeline never mutates the world; it reads regions
//! through [`RegionProvider`] and captures [`ChunkSnapshot`]s through
//! [`WorldAccess`] on the owning context.

pub mod access;
pub mod block;
pub mod position;
pub mod region;
pub mod snapshot;

pub use access::{GridWorld, WorldAccess};
pub use block::{BlockId, BlockRegistry, BlockState};
pub use position::{Area, CellPos, ChunkPos, CHUNK_SIZE};
pub use region::{OwnerId, Region, RegionDirectory, RegionId, RegionProvider, WorldId};
pub use snapshot::ChunkSnapshot;
