//! Reading one config file from disk

use super::ConfigFormat;
use crate::{error::ConfigError, Config, Result};
use std::path::Path;
use std::{fs, io};

/// Parse the file at `path`, picking the format from its extension.
/// Not validated: a later layer may still fix a value.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(ConfigError::IoError {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let config = format.parse(&content, Some(&path.display().to_string()))?;
    tracing::debug!(path = %path.display(), format = format.name(), "read configuration file");
    Ok(config)
}
