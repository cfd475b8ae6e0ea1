//! Layered loading: defaults, then files, the environment and explicit
//! values in the order they are added

pub mod env;
pub mod file;
pub mod formats;
pub mod merge;

pub use formats::ConfigFormat;

use crate::{Config, Result, Validate};
use std::path::{Path, PathBuf};

/// Names probed by [`Config::load`] in the working directory, first hit wins
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".codechunk.toml",
    ".codechunk.yml",
    ".codechunk.yaml",
    ".codechunk.json",
];

enum Layer {
    File(PathBuf),
    Env,
    Value(Config),
}

/// Each layer overrides the fields it sets to a non-default value.
///
/// ```no_run
/// use codechunk_config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .with_file(".codechunk.toml")
///     .with_env()
///     .build()?;
/// # Ok::<(), codechunk_config::ConfigError>(())
/// ```
#[derive(Default)]
pub struct ConfigBuilder {
    layers: Vec<Layer>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.layers.push(Layer::File(path.as_ref().to_path_buf()));
        self
    }

    /// `CODECHUNK_<SECTION>_<FIELD>` variables, see [`env`]
    pub fn with_env(mut self) -> Self {
        self.layers.push(Layer::Env);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.layers.push(Layer::Value(config));
        self
    }

    /// Merge every layer over the defaults, then validate once
    pub fn build(self) -> Result<Config> {
        let mut config = Config::default();
        for layer in self.layers {
            let overlay = match layer {
                Layer::File(path) => Some(file::load_from_file(&path)?),
                Layer::Env => env::from_env()?,
                Layer::Value(value) => Some(value),
            };
            if let Some(overlay) = overlay {
                config = merge::merge(config, overlay);
            }
        }
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// The first of [`CONFIG_FILE_NAMES`] present (defaults when none is),
    /// with environment overrides on top
    pub fn load() -> Result<Self> {
        let found = CONFIG_FILE_NAMES.iter().find(|name| Path::new(name).is_file());
        let builder = match found {
            Some(name) => {
                tracing::debug!(path = name, "found configuration file");
                ConfigBuilder::new().with_file(name)
            }
            None => ConfigBuilder::new(),
        };
        builder.with_env().build()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        ConfigBuilder::new().with_file(path).with_env().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::env::ENV_LOCK;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_builder_default() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_builder_with_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("CODECHUNK_POOL_FILE_BATCH_SIZE", "9");
        let config = ConfigBuilder::new().with_env().build();
        env::remove_var("CODECHUNK_POOL_FILE_BATCH_SIZE");
        assert_eq!(config.unwrap().pool.file_batch_size, 9);
    }

    #[test]
    fn test_precedence_file_env_explicit() {
        let _guard = ENV_LOCK.lock().unwrap();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[chunking]\nmax_tokens = 700\nmin_tokens = 10\n\n[fallback]\nwindow_chars = 1500").unwrap();

        env::set_var("CODECHUNK_CHUNKING_MAX_TOKENS", "800");
        let mut explicit = Config::default();
        explicit.fallback.window_chars = 3000;

        let config = ConfigBuilder::new()
            .with_file(file.path())
            .with_env()
            .with_config(explicit)
            .build();
        env::remove_var("CODECHUNK_CHUNKING_MAX_TOKENS");

        let config = config.unwrap();
        assert_eq!(config.chunking.min_tokens, 10);
        assert_eq!(config.chunking.max_tokens, 800);
        assert_eq!(config.fallback.window_chars, 3000);
    }

    #[test]
    fn test_invalid_merged_config_rejected() {
        let mut explicit = Config::default();
        explicit.fallback.overlap_chars = 5000;
        assert!(ConfigBuilder::new().with_config(explicit).build().is_err());
    }
}
