//! Config sections

pub mod chunking;
pub mod core;
pub mod dedup;
pub mod fallback;
pub mod pool;
pub mod rate_limit;

pub use chunking::{ChunkingConfig, OversizeStrategy};
pub use core::CoreConfig;
pub use dedup::{DedupConfig, HashAlgorithmChoice};
pub use fallback::FallbackConfig;
pub use pool::{PoolConfig, HARD_MAX_WORKERS};
pub use rate_limit::RateLimitConfig;

use serde::{Deserialize, Serialize};

/// Every section defaults when absent from the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// File selection
    #[serde(default)]
    pub core: CoreConfig,

    /// Chunk size budgets and AST splitting behavior
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Emergency splitter used when a format splitter fails
    #[serde(default)]
    pub fallback: FallbackConfig,

    /// Hashing, deduplication and metadata limits
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Worker pool sizing and timeouts
    #[serde(default)]
    pub pool: PoolConfig,

    /// Shared request budget for the source API
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl crate::validation::Validate for Config {
    fn validate(&self) -> crate::error::Result<()> {
        let sections: [&dyn crate::validation::Validate; 6] = [
            &self.core,
            &self.chunking,
            &self.fallback,
            &self.dedup,
            &self.pool,
            &self.rate_limit,
        ];
        sections.iter().try_for_each(|section| section.validate())
    }
}
