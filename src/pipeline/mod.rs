//! Bounded-concurrency scan scheduler
//!
//! [`Pipeliner`] admits jobs, drives the per-job scan loop from the owning
//! context, enforces single-flight and the wall-clock budget, and tracks
//! average latency for ETA display. [`ScanHandle`] is the shared completion
//! future each requester holds.

pub mod handle;
pub mod job;
pub mod pipeliner;

pub use handle::ScanHandle;
pub use job::CompletionCallback;
pub use pipeliner::{Pipeliner, PipelineStats, DEFAULT_DURATION_ESTIMATE};
