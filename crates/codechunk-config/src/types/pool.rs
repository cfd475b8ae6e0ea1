//! Worker pool configuration

use serde::{Deserialize, Serialize};

/// Upper bound on workers regardless of configuration, to bound vendor API concurrency
pub const HARD_MAX_WORKERS: usize = 8;

/// Worker pool sizing, batching and timeouts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of workers; 0 means available parallelism
    ///
    /// Always capped at [`HARD_MAX_WORKERS`].
    #[serde(default)]
    pub max_workers: usize,

    /// Files fetched per batch inside one work unit
    #[serde(default = "default_file_batch_size")]
    pub file_batch_size: usize,

    /// Unit timeout as a multiple of its estimated processing time
    #[serde(default = "default_timeout_multiplier")]
    pub timeout_multiplier: f32,

    /// Lower bound on any unit timeout
    #[serde(default = "default_min_unit_timeout_ms")]
    pub min_unit_timeout_ms: u64,

    /// Estimated fixed cost per file
    #[serde(default = "default_per_file_estimate_ms")]
    pub per_file_estimate_ms: u64,

    /// Estimated cost per KiB of file content
    #[serde(default = "default_per_kib_estimate_ms")]
    pub per_kib_estimate_ms: u64,

    /// Manager tick period (timeouts, rate-limit recovery, window resets)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl PoolConfig {
    /// Worker count after resolving `0` and applying the hard cap
    pub fn effective_workers(&self) -> usize {
        let requested = if self.max_workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.max_workers
        };
        requested.min(HARD_MAX_WORKERS)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 0,
            file_batch_size: default_file_batch_size(),
            timeout_multiplier: default_timeout_multiplier(),
            min_unit_timeout_ms: default_min_unit_timeout_ms(),
            per_file_estimate_ms: default_per_file_estimate_ms(),
            per_kib_estimate_ms: default_per_kib_estimate_ms(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl crate::validation::Validate for PoolConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{validate_positive, validate_range};

        validate_positive("pool.file_batch_size", self.file_batch_size as u64)?;
        validate_positive("pool.tick_interval_ms", self.tick_interval_ms)?;
        validate_range("pool.timeout_multiplier", self.timeout_multiplier, 1.0..=100.0)
    }
}

fn default_file_batch_size() -> usize {
    5
}

fn default_timeout_multiplier() -> f32 {
    3.0
}

fn default_min_unit_timeout_ms() -> u64 {
    30_000
}

fn default_per_file_estimate_ms() -> u64 {
    200
}

fn default_per_kib_estimate_ms() -> u64 {
    5
}

fn default_tick_interval_ms() -> u64 {
    250
}
