//! Settings for codechunk: one typed section per concern, loaded from
//! YAML, TOML or JSON, overridden from `CODECHUNK_*` variables and
//! validated after merging.
//!
//! ```no_run
//! use codechunk_config::Config;
//!
//! let config = Config::load()?;
//! let workers = config.pool.effective_workers();
//! let budget = config.chunking.max_tokens;
//! # Ok::<(), codechunk_config::ConfigError>(())
//! ```

pub mod error;
pub mod loader;
pub mod types;
pub mod validation;

pub use error::{ConfigError, ErrorFormatter, Result};
pub use loader::{ConfigBuilder, ConfigFormat};
pub use types::*;
pub use validation::Validate;
