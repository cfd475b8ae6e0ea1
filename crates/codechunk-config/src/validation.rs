//! Section validation and the checks sections share

use crate::error::{ConfigError, Result};
use std::fmt::Display;
use std::ops::RangeInclusive;

/// Checks serde cannot express: value ranges and relations between fields.
/// Runs once, on the fully merged config.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_range(field: &str, value: f32, range: RangeInclusive<f32>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange {
        field: field.to_string(),
        value,
        min: *range.start(),
        max: *range.end(),
    })
}

pub fn validate_positive(field: &str, value: u64) -> Result<()> {
    if value > 0 {
        return Ok(());
    }
    Err(ConfigError::NotPositive {
        field: field.to_string(),
    })
}

/// `value` (the `field`) must be strictly below `bound` (the `bound_field`)
pub fn validate_below<T: PartialOrd + Display>(
    field: &str,
    value: T,
    bound_field: &str,
    bound: T,
) -> Result<()> {
    if value < bound {
        return Ok(());
    }
    Err(invalid(
        field,
        format!("{value} must be < {bound_field} ({bound})"),
    ))
}

pub fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}
