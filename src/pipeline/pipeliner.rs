use crate::config::PipelineConfig;
use crate::pipeline::job::{CompletionCallback, QueuedJob, RunningJob};
use crate::pipeline::ScanHandle;
use crate::scoring::{
    death_count, finalize, score_batch, ChunkScanState, FinalizeInputs, PlayerStats, Results,
};
use crate::values::ValueTable;
use crate::world::{Region, RegionId, RegionProvider, WorldAccess};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// ETA estimate reported before any job has completed
pub const DEFAULT_DURATION_ESTIMATE: Duration = Duration::from_millis(400);

/// Bounded-concurrency scheduler for region scan jobs.
///
/// The driver is [`tick`](Pipeliner::tick), called periodically from the
/// owning context (the embedding loop's thread); chunk capture, finalize
/// and completion callbacks all happen there. Callbacks and handle
/// completion fire with no scheduler lock held, so a callback may submit
/// follow-up jobs. Only pure block counting
/// over immutable snapshots runs on the worker pool, and batch completion
/// comes back over a channel drained by the next tick. Each job has at
/// most one batch in flight; up to the configured concurrency limit of
/// jobs may each have one batch in flight at once.
///
/// Constructed once and passed by reference to its collaborators; there is
/// no global job registry.
pub struct Pipeliner {
    table: Arc<ValueTable>,
    regions: Arc<dyn RegionProvider>,
    stats: Arc<dyn PlayerStats>,
    config: PipelineConfig,
    pool: rayon::ThreadPool,
    inner: Mutex<Inner>,
    batch_done_tx: Sender<RegionId>,
    batch_done_rx: Receiver<RegionId>,
    latency: Mutex<LatencyTracker>,
    counters: PipelineCounters,
}

struct Inner {
    /// Live handle per region id; the single-flight guarantee
    handles: HashMap<RegionId, ScanHandle>,
    queue: VecDeque<QueuedJob>,
    running: HashMap<RegionId, RunningJob>,
}

/// A job resolved during a tick. Its callback and handle fire only after
/// the scheduler lock is released, so both may call back into the
/// scheduler (a follow-up submit from a notifier, for example).
struct Completion {
    region: Region,
    results: Option<Results>,
    handle: ScanHandle,
    on_complete: Option<CompletionCallback>,
}

impl Completion {
    fn resolve(mut self) {
        if let Some(callback) = self.on_complete.take() {
            callback(&self.region, self.results.as_mut());
        }
        self.handle.complete(self.results);
    }
}

#[derive(Default)]
struct PipelineCounters {
    submitted: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    timed_out: AtomicU64,
}

/// Scheduler throughput counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub submitted: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub timed_out: u64,
}

struct LatencyTracker {
    total: Duration,
    samples: u32,
}

impl LatencyTracker {
    fn record(&mut self, sample: Duration) {
        self.total += sample;
        self.samples += 1;
    }

    fn average(&self) -> Duration {
        if self.samples == 0 {
            DEFAULT_DURATION_ESTIMATE
        } else {
            self.total / self.samples
        }
    }
}

impl Pipeliner {
    pub fn new(
        table: Arc<ValueTable>,
        regions: Arc<dyn RegionProvider>,
        stats: Arc<dyn PlayerStats>,
        config: PipelineConfig,
    ) -> anyhow::Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.effective_worker_threads())
            .thread_name(|idx| format!("island-scan-{}", idx))
            .build()?;

        let (batch_done_tx, batch_done_rx) = unbounded();

        Ok(Self {
            table,
            regions,
            stats,
            config,
            pool,
            inner: Mutex::new(Inner {
                handles: HashMap::new(),
                queue: VecDeque::new(),
                running: HashMap::new(),
            }),
            batch_done_tx,
            batch_done_rx,
            latency: Mutex::new(LatencyTracker {
                total: Duration::ZERO,
                samples: 0,
            }),
            counters: PipelineCounters::default(),
        })
    }

    /// Enqueue a scan job for `region`.
    ///
    /// Resolves immediately with `None` when the region is already
    /// deleted/unowned. A second submit for a region with a live job
    /// returns the existing handle instead of starting a duplicate.
    pub fn submit(&self, region: &Region) -> ScanHandle {
        self.submit_with(region, 0, None)
    }

    /// [`submit`](Pipeliner::submit) carrying the region's stored initial
    /// level and an owning-context completion callback.
    pub fn submit_with(
        &self,
        region: &Region,
        initial_level: i64,
        on_complete: Option<CompletionCallback>,
    ) -> ScanHandle {
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.handles.get(&region.id) {
            log::debug!("scan already in flight for {}; sharing handle", region.id);
            return existing.clone();
        }

        if self.regions.lookup(region.id).is_none() {
            // Resolve unlocked; the callback may re-enter the scheduler
            drop(inner);
            log::debug!("{} deleted before admission; resolving null", region.id);
            if let Some(callback) = on_complete {
                callback(region, None);
            }
            return ScanHandle::resolved(None);
        }

        let handle = ScanHandle::pending();
        inner.handles.insert(region.id, handle.clone());
        inner.queue.push_back(QueuedJob {
            region: region.clone(),
            initial_level,
            handle: handle.clone(),
            on_complete,
        });
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        log::info!("queued scan for {} in {}", region.id, region.world);
        handle
    }

    /// Queued + in-flight job count, for ETA display
    pub fn queue_depth(&self) -> usize {
        let inner = self.inner.lock();
        inner.queue.len() + inner.running.len()
    }

    /// Running average of completed-job latency
    pub fn average_duration(&self) -> Duration {
        self.latency.lock().average()
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }

    /// The periodic driver. Must be called from the owning context.
    ///
    /// Drains batch-completion signals, runs the boundary checks
    /// (cancellation, timeout, finalize) for every job whose batch is not
    /// in flight, admits queued jobs while capacity remains, and captures
    /// the next batch for every idle running job.
    pub fn tick(&self, world: &dyn WorldAccess) {
        let mut completions = Vec::new();
        {
            let mut inner = self.inner.lock();

            // Batch N's scoring signalled completion; batch N+1 may start
            while let Ok(region_id) = self.batch_done_rx.try_recv() {
                if let Some(job) = inner.running.get_mut(&region_id) {
                    job.batch_in_flight = false;
                }
            }

            self.boundary_pass(&mut inner, &mut completions);
            self.admit(&mut inner, &mut completions);
            self.capture(&mut inner, world);
        }

        for completion in completions {
            completion.resolve();
        }
    }

    /// Cancellation, timeout and finalize checks at the batch boundary.
    /// Resolved jobs are collected for unlocked completion.
    fn boundary_pass(&self, inner: &mut Inner, completions: &mut Vec<Completion>) {
        let ids: Vec<RegionId> = inner
            .running
            .iter()
            .filter(|(_, job)| !job.batch_in_flight)
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let current = self.regions.lookup(id);
            let cancelled = match &current {
                None => true,
                Some(region) => {
                    let job = &inner.running[&id];
                    region.owner != job.region.owner
                }
            };

            if cancelled {
                let job = match inner.running.remove(&id) {
                    Some(job) => job,
                    None => continue,
                };
                inner.handles.remove(&id);
                log::info!("{} deleted or unowned mid-scan; discarding results", id);
                completions.push(Completion {
                    region: job.region,
                    results: None,
                    handle: job.handle,
                    on_complete: job.on_complete,
                });
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            let job = &inner.running[&id];
            if Instant::now() >= job.deadline {
                let job = match inner.running.remove(&id) {
                    Some(job) => job,
                    None => continue,
                };
                inner.handles.remove(&id);
                log::warn!(
                    "scan for {} exceeded its {}s budget with {} chunks left",
                    id,
                    self.config.timeout_secs,
                    job.scan.remaining()
                );
                let mut results = job.results.lock().clone();
                results.mark_timeout();
                completions.push(Completion {
                    region: job.region,
                    results: Some(results),
                    handle: job.handle,
                    on_complete: job.on_complete,
                });
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            if job.scan.is_done() {
                let job = match inner.running.remove(&id) {
                    Some(job) => job,
                    None => continue,
                };
                inner.handles.remove(&id);
                // Region may have moved or changed handicap since start
                let region = current.unwrap_or_else(|| job.region.clone());

                let mut results = job.results.lock().clone();
                let inputs = FinalizeInputs {
                    deaths: death_count(self.stats.as_ref(), self.table.death_mode(), &region),
                    initial_level: job.initial_level,
                    region_handicap: region.handicap,
                };
                finalize(&mut results, &self.table, inputs);

                let elapsed = job.elapsed();
                self.latency.lock().record(elapsed);
                log::info!(
                    "scan for {} finished in {:?}: level {} ({} points)",
                    id,
                    elapsed,
                    results.level(),
                    results.total_points()
                );

                completions.push(Completion {
                    region,
                    results: Some(results),
                    handle: job.handle,
                    on_complete: job.on_complete,
                });
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Start queued jobs while concurrency capacity remains
    fn admit(&self, inner: &mut Inner, completions: &mut Vec<Completion>) {
        while inner.running.len() < self.config.concurrency {
            let queued = match inner.queue.pop_front() {
                Some(queued) => queued,
                None => break,
            };

            // Re-check at the moment the job would start
            let region = match self.regions.lookup(queued.region_id()) {
                Some(region) => region,
                None => {
                    inner.handles.remove(&queued.region_id());
                    log::info!("{} deleted before start; resolving null", queued.region_id());
                    completions.push(Completion {
                        region: queued.region,
                        results: None,
                        handle: queued.handle,
                        on_complete: queued.on_complete,
                    });
                    self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            let scan = ChunkScanState::for_region(&region);
            log::debug!(
                "starting scan for {}: {} chunks, deadline {}s",
                region.id,
                scan.total(),
                self.config.timeout_secs
            );
            let now = Instant::now();
            inner.running.insert(
                region.id,
                RunningJob {
                    region,
                    scan,
                    results: Arc::new(Mutex::new(Results::new())),
                    handle: queued.handle,
                    initial_level: queued.initial_level,
                    started: now,
                    deadline: now + self.config.timeout(),
                    batch_in_flight: false,
                    on_complete: queued.on_complete,
                },
            );
        }
    }

    /// Capture the next batch for every idle running job and dispatch it
    /// to the worker pool
    fn capture(&self, inner: &mut Inner, world: &dyn WorldAccess) {
        for job in inner.running.values_mut() {
            if job.batch_in_flight || job.scan.is_done() {
                continue;
            }

            let coords = job.scan.next_batch(self.config.batch_size);
            // Snapshots are taken on the owning context, loading each
            // chunk if needed; the copies are all the worker ever sees
            let snapshots: Vec<_> = coords
                .into_iter()
                .map(|pos| {
                    world.snapshot(
                        &job.region.world,
                        pos,
                        self.config.scan_min_y,
                        self.config.scan_max_y,
                    )
                })
                .collect();

            let region = job.region.clone();
            let table = Arc::clone(&self.table);
            let results = Arc::clone(&job.results);
            let done = self.batch_done_tx.clone();
            job.batch_in_flight = true;

            self.pool.spawn(move || {
                score_batch(&snapshots, &region, &table, &results);
                let _ = done.send(region.id);
            });
        }
    }
}
