//! Scoring configuration
//!
//! Deserialized from TOML. Block values are keyed by type name, with
//! `name:variant` keys pricing a specific variant ahead of the generic
//! type. A malformed level formula is reported at load time and replaced
//! by [`DEFAULT_FORMULA`]; the pipeline keeps scoring.

use crate::equation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Safe fallback applied when the configured formula does not parse
pub const DEFAULT_FORMULA: &str = "blocks / level_cost";

/// Variables the level formula may reference
pub const FORMULA_VARS: &[&str] = &["blocks", "level_cost"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Per-world overrides for block values and sea height
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldOverrides {
    /// Sea height threshold for this world; 0 disables underwater scoring
    pub sea_height: Option<i32>,
    /// Block values overriding the global table in this world
    pub blocks: HashMap<String, i64>,
}

/// Pipeline scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of jobs with a batch in flight at once
    pub concurrency: usize,
    /// Chunk columns captured per batch
    pub batch_size: usize,
    /// Wall-clock budget per scan job, in seconds
    pub timeout_secs: u64,
    /// Worker threads for block counting; 0 picks a CPU-based default
    pub worker_threads: usize,
    /// Lowest cell layer scanned
    pub scan_min_y: i32,
    /// Highest cell layer scanned
    pub scan_max_y: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            batch_size: 50,
            timeout_secs: 300,
            worker_threads: 0,
            scan_min_y: 0,
            scan_max_y: 255,
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            (num_cpus::get() / 2).max(1)
        }
    }
}

/// How the death handicap is sourced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathMode {
    /// Only the region owner's deaths count
    Owner,
    /// Deaths of the owner and every member are summed
    Team,
}

/// Complete scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Level formula over `blocks` and `level_cost`
    pub formula: String,
    /// Points per level
    pub level_cost: i64,
    /// Points subtracted per death
    pub death_penalty: i64,
    pub death_mode: DeathMode,
    /// Applied once at finalize to the underwater raw total
    pub underwater_multiplier: f64,
    /// Default sea height for worlds without an override; 0 disables
    pub sea_height: i32,
    /// Value for types absent from every table; `None` means unconfigured
    pub default_value: Option<i64>,
    /// Global block values; `name:variant` keys take priority over `name`
    pub blocks: HashMap<String, i64>,
    /// Per-type tally caps; occurrences beyond the cap score zero
    pub limits: HashMap<String, u64>,
    /// Per-world overrides
    pub worlds: HashMap<String, WorldOverrides>,
    pub pipeline: PipelineConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            formula: DEFAULT_FORMULA.to_string(),
            level_cost: 100,
            death_penalty: 100,
            death_mode: DeathMode::Owner,
            underwater_multiplier: 1.0,
            sea_height: 0,
            default_value: None,
            blocks: HashMap::new(),
            limits: HashMap::new(),
            worlds: HashMap::new(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ScoringConfig {
    /// Parse from TOML text and sanitize
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: ScoringConfig = toml::from_str(text)?;
        config.sanitize();
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Replace unusable settings with safe defaults, reporting each one.
    ///
    /// A malformed formula is a configuration error, not a scoring error:
    /// the operator is told, and the default formula is substituted so the
    /// pipeline never refuses to score.
    pub fn sanitize(&mut self) {
        if let Err(err) = equation::validate(&self.formula, FORMULA_VARS) {
            log::error!(
                "invalid level formula {:?} ({}); falling back to {:?}",
                self.formula,
                err,
                DEFAULT_FORMULA
            );
            self.formula = DEFAULT_FORMULA.to_string();
        }
        if self.level_cost <= 0 {
            log::error!("level_cost must be positive, got {}; using 100", self.level_cost);
            self.level_cost = 100;
        }
        if self.pipeline.concurrency == 0 {
            log::warn!("pipeline.concurrency of 0 would stall scans; using 1");
            self.pipeline.concurrency = 1;
        }
        if self.pipeline.batch_size == 0 {
            log::warn!("pipeline.batch_size of 0 would stall scans; using 1");
            self.pipeline.batch_size = 1;
        }
    }
}
