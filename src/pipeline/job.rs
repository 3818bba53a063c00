use crate::pipeline::ScanHandle;
use crate::scoring::{ChunkScanState, Results};
use crate::world::{Region, RegionId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Invoked on the owning context when a job resolves. `None` for benign
/// cancellation; `Some` for finalized or timed-out results.
pub type CompletionCallback = Box<dyn FnOnce(&Region, Option<&mut Results>) + Send>;

/// A job admitted but not yet started
pub(crate) struct QueuedJob {
    /// Region as observed at submission
    pub region: Region,
    pub initial_level: i64,
    pub handle: ScanHandle,
    pub on_complete: Option<CompletionCallback>,
}

impl QueuedJob {
    pub fn region_id(&self) -> RegionId {
        self.region.id
    }
}

/// A job whose scan loop is running
pub(crate) struct RunningJob {
    /// Region as observed at start; ownership changes are re-checked
    /// against the provider at every batch boundary
    pub region: Region,
    pub scan: ChunkScanState,
    pub results: Arc<Mutex<Results>>,
    pub handle: ScanHandle,
    pub initial_level: i64,
    pub started: Instant,
    pub deadline: Instant,
    /// Exactly one batch may be in flight per job
    pub batch_in_flight: bool,
    pub on_complete: Option<CompletionCallback>,
}

impl RunningJob {
    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}
