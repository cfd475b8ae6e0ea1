//! Environment variable configuration overlay
//!
//! Variables take the form `CODECHUNK_<SECTION>_<FIELD>=value`, e.g.
//! `CODECHUNK_CHUNKING_MAX_TOKENS=1024` or `CODECHUNK_RATE_LIMIT_WINDOW_SECS=60`.

use crate::{error::ConfigError, types::*, Config, Result};
use std::env;
use std::str::FromStr;

const PREFIX: &str = "CODECHUNK_";

/// Sections in match order; longer names first so `rate_limit` is not read as `rate`
const SECTIONS: &[&str] = &["rate_limit", "chunking", "fallback", "dedup", "core", "pool"];

/// Parse configuration from environment variables
///
/// Returns `None` when no `CODECHUNK_` variable is set. Variables that fail to
/// parse are logged and skipped.
pub fn from_env() -> Result<Option<Config>> {
    let vars: Vec<(String, String)> = env::vars().filter(|(k, _)| k.starts_with(PREFIX)).collect();
    if vars.is_empty() {
        return Ok(None);
    }

    let mut config = Config::default();
    for (key, value) in vars {
        if let Err(e) = apply_env_var(&mut config, &key, &value) {
            tracing::warn!(var = %key, error = %e, "ignoring invalid environment override");
        }
    }
    Ok(Some(config))
}

/// Apply a single environment variable to config
fn apply_env_var(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let rest = key.strip_prefix(PREFIX).unwrap_or(key).to_lowercase();

    let Some((section, field)) = SECTIONS.iter().find_map(|s| {
        rest.strip_prefix(s)
            .and_then(|tail| tail.strip_prefix('_'))
            .filter(|f| !f.is_empty())
            .map(|f| (*s, f))
    }) else {
        return Err(ConfigError::EnvVarError {
            var: key.to_string(),
            message: format!(
                "Expected {}<SECTION>_<FIELD> with section one of: {}",
                PREFIX,
                SECTIONS.join(", ")
            ),
        });
    };

    match section {
        "core" => apply_core_var(&mut config.core, key, field, value),
        "chunking" => apply_chunking_var(&mut config.chunking, key, field, value),
        "fallback" => apply_fallback_var(&mut config.fallback, key, field, value),
        "dedup" => apply_dedup_var(&mut config.dedup, key, field, value),
        "pool" => apply_pool_var(&mut config.pool, key, field, value),
        "rate_limit" => apply_rate_limit_var(&mut config.rate_limit, key, field, value),
        _ => Err(unknown_field(key, field)),
    }
}

fn parse<T: FromStr>(var: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConfigError::EnvVarError {
        var: var.to_string(),
        message: format!(
            "Invalid value '{}' (expected {})",
            value,
            std::any::type_name::<T>()
        ),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn unknown_field(var: &str, field: &str) -> ConfigError {
    ConfigError::EnvVarError {
        var: var.to_string(),
        message: format!("Unknown field: {}", field),
    }
}

fn apply_core_var(config: &mut CoreConfig, var: &str, field: &str, value: &str) -> Result<()> {
    match field {
        "include_paths" => config.include_paths = parse_list(value),
        "exclude_paths" => config.exclude_paths = parse_list(value),
        "max_file_bytes" => config.max_file_bytes = parse(var, value)?,
        _ => return Err(unknown_field(var, field)),
    }
    Ok(())
}

fn apply_chunking_var(
    config: &mut ChunkingConfig,
    var: &str,
    field: &str,
    value: &str,
) -> Result<()> {
    match field {
        "min_tokens" => config.min_tokens = parse(var, value)?,
        "max_tokens" => config.max_tokens = parse(var, value)?,
        "overlap_tokens" => config.overlap_tokens = parse(var, value)?,
        "chars_per_token" => config.chars_per_token = parse(var, value)?,
        "min_residual_chars" => config.min_residual_chars = parse(var, value)?,
        "use_ast" => config.use_ast = parse_bool(var, value)?,
        "oversize" => {
            config.oversize = match value.to_lowercase().as_str() {
                "split" => OversizeStrategy::Split,
                "truncate" => OversizeStrategy::Truncate,
                _ => {
                    return Err(ConfigError::invalid_enum(
                        "chunking.oversize",
                        value,
                        &["split", "truncate"],
                    ))
                }
            }
        }
        _ => return Err(unknown_field(var, field)),
    }
    Ok(())
}

fn apply_fallback_var(
    config: &mut FallbackConfig,
    var: &str,
    field: &str,
    value: &str,
) -> Result<()> {
    match field {
        "window_chars" => config.window_chars = parse(var, value)?,
        "overlap_chars" => config.overlap_chars = parse(var, value)?,
        _ => return Err(unknown_field(var, field)),
    }
    Ok(())
}

fn apply_dedup_var(config: &mut DedupConfig, var: &str, field: &str, value: &str) -> Result<()> {
    match field {
        "hash_algorithm" => {
            config.hash_algorithm = match value.to_lowercase().as_str() {
                "auto" => HashAlgorithmChoice::Auto,
                "xxh3" => HashAlgorithmChoice::Xxh3,
                "sha256" => HashAlgorithmChoice::Sha256,
                _ => {
                    return Err(ConfigError::invalid_enum(
                        "dedup.hash_algorithm",
                        value,
                        &["auto", "xxh3", "sha256"],
                    ))
                }
            }
        }
        "detect_near_duplicates" => config.detect_near_duplicates = parse_bool(var, value)?,
        "near_duplicate_distance" => config.near_duplicate_distance = parse(var, value)?,
        "drop_near_duplicates" => config.drop_near_duplicates = parse_bool(var, value)?,
        "max_metadata_bytes" => config.max_metadata_bytes = parse(var, value)?,
        "max_list_len" => config.max_list_len = parse(var, value)?,
        "max_string_len" => config.max_string_len = parse(var, value)?,
        _ => return Err(unknown_field(var, field)),
    }
    Ok(())
}

fn apply_pool_var(config: &mut PoolConfig, var: &str, field: &str, value: &str) -> Result<()> {
    match field {
        "max_workers" => config.max_workers = parse(var, value)?,
        "file_batch_size" => config.file_batch_size = parse(var, value)?,
        "timeout_multiplier" => config.timeout_multiplier = parse(var, value)?,
        "min_unit_timeout_ms" => config.min_unit_timeout_ms = parse(var, value)?,
        "per_file_estimate_ms" => config.per_file_estimate_ms = parse(var, value)?,
        "per_kib_estimate_ms" => config.per_kib_estimate_ms = parse(var, value)?,
        "tick_interval_ms" => config.tick_interval_ms = parse(var, value)?,
        _ => return Err(unknown_field(var, field)),
    }
    Ok(())
}

fn apply_rate_limit_var(
    config: &mut RateLimitConfig,
    var: &str,
    field: &str,
    value: &str,
) -> Result<()> {
    match field {
        "max_requests_per_window" => config.max_requests_per_window = parse(var, value)?,
        "window_secs" => config.window_secs = parse(var, value)?,
        "throttle_ratio" => config.throttle_ratio = parse(var, value)?,
        "default_retry_after_secs" => config.default_retry_after_secs = parse(var, value)?,
        _ => return Err(unknown_field(var, field)),
    }
    Ok(())
}

/// Parse boolean from string (accepts true/false, 1/0, yes/no, on/off)
fn parse_bool(var: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::EnvVarError {
            var: var.to_string(),
            message: format!("Invalid boolean: {} (expected true/false)", value),
        }),
    }
}

#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
