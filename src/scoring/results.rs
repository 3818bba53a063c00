use crate::world::{BlockId, BlockRegistry};
use std::collections::HashMap;
use std::fmt;

/// Lifecycle of one scan job's results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Scanning phase; counters are being accumulated
    #[default]
    InProgress,
    /// Finalize ran; all fields are settled
    Available,
    /// The wall-clock budget expired before the backlog emptied
    Timeout,
}

/// Tally buckets a scanned cell can land in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Normal,
    Underwater,
    OverLimit,
    Unconfigured,
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Normal => f.write_str("normal"),
            Bucket::Underwater => f.write_str("underwater"),
            Bucket::OverLimit => f.write_str("over limit"),
            Bucket::Unconfigured => f.write_str("unconfigured"),
        }
    }
}

/// Aggregation record for one scan job.
///
/// Counters are mutated only during the scanning phase, by the single
/// worker owning the current batch (the record is shared behind a mutex).
/// Finalize fields are written exactly once, after the backlog is empty or
/// a timeout fires.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    normal: HashMap<BlockId, u64>,
    underwater: HashMap<BlockId, u64>,
    over_limit: HashMap<BlockId, u64>,
    unconfigured: HashMap<BlockId, u64>,
    /// Running per-type totals backing cap enforcement across batches
    cap_counts: HashMap<BlockId, u64>,

    raw_total: i64,
    underwater_total: i64,

    level: i64,
    initial_level: i64,
    death_handicap: i64,
    points_to_next_level: i64,
    total_points: i64,

    state: ScanState,
    finalized: bool,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the next occurrence slot for a capped type.
    /// Returns false once `limit` occurrences have been claimed.
    pub fn claim_cap_slot(&mut self, id: BlockId, limit: u64) -> bool {
        let count = self.cap_counts.entry(id).or_insert(0);
        *count += 1;
        *count <= limit
    }

    pub fn tally_normal(&mut self, id: BlockId, value: i64) {
        *self.normal.entry(id).or_insert(0) += 1;
        self.raw_total += value;
    }

    pub fn tally_underwater(&mut self, id: BlockId, value: i64) {
        *self.underwater.entry(id).or_insert(0) += 1;
        self.underwater_total += value;
    }

    pub fn tally_over_limit(&mut self, id: BlockId) {
        *self.over_limit.entry(id).or_insert(0) += 1;
    }

    pub fn tally_unconfigured(&mut self, id: BlockId) {
        *self.unconfigured.entry(id).or_insert(0) += 1;
    }

    pub fn bucket_counts(&self, bucket: Bucket) -> &HashMap<BlockId, u64> {
        match bucket {
            Bucket::Normal => &self.normal,
            Bucket::Underwater => &self.underwater,
            Bucket::OverLimit => &self.over_limit,
            Bucket::Unconfigured => &self.unconfigured,
        }
    }

    pub fn raw_total(&self) -> i64 {
        self.raw_total
    }

    pub fn underwater_total(&self) -> i64 {
        self.underwater_total
    }

    pub fn level(&self) -> i64 {
        self.level
    }

    pub fn initial_level(&self) -> i64 {
        self.initial_level
    }

    pub fn death_handicap(&self) -> i64 {
        self.death_handicap
    }

    pub fn points_to_next_level(&self) -> i64 {
        self.points_to_next_level
    }

    pub fn total_points(&self) -> i64 {
        self.total_points
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Mark the record as timed out. Counters gathered so far stay
    /// readable; finalize fields are left at their defaults.
    pub fn mark_timeout(&mut self) {
        self.state = ScanState::Timeout;
    }

    pub(crate) fn set_final_fields(
        &mut self,
        raw_total: i64,
        level: i64,
        initial_level: i64,
        death_handicap: i64,
        points_to_next_level: i64,
        total_points: i64,
    ) {
        self.raw_total = raw_total;
        self.level = level;
        self.initial_level = initial_level;
        self.death_handicap = death_handicap;
        self.points_to_next_level = points_to_next_level;
        self.total_points = total_points;
        self.state = ScanState::Available;
        self.finalized = true;
    }

    /// Post-calculation interceptors may rewrite the final level before
    /// it is persisted.
    pub fn override_level(&mut self, level: i64) {
        self.level = level;
    }

    /// Ordered textual breakdown per bucket, descending by count.
    ///
    /// Reporting artifact only; never feeds back into scoring. Ties are
    /// broken by block name so the output is deterministic.
    pub fn breakdown_report(&self, registry: &BlockRegistry) -> String {
        let mut report = String::new();
        for bucket in [
            Bucket::Normal,
            Bucket::Underwater,
            Bucket::OverLimit,
            Bucket::Unconfigured,
        ] {
            let counts = self.bucket_counts(bucket);
            if counts.is_empty() {
                continue;
            }
            let mut rows: Vec<(&str, u64)> = counts
                .iter()
                .map(|(id, count)| (registry.name(*id), *count))
                .collect();
            rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

            let subtotal: u64 = rows.iter().map(|(_, c)| c).sum();
            report.push_str(&format!("{} ({} blocks):\n", bucket, subtotal));
            for (name, count) in rows {
                report.push_str(&format!("  {} x {}\n", name, count));
            }
        }
        report
    }
}
