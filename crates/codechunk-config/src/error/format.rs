//! Terminal rendering of [`ConfigError`]

use crate::error::ConfigError;
use std::fmt;
use yansi::Paint;

/// Colors the field, the bad value and the hint when stderr is a terminal
/// and `NO_COLOR` is unset
pub struct ErrorFormatter {
    error: ConfigError,
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new(error: ConfigError) -> Self {
        Self {
            error,
            use_colors: supports_color(),
        }
    }

    pub fn format(&self) -> String {
        if self.use_colors {
            self.format_colored()
        } else {
            self.error.to_string()
        }
    }

    fn format_colored(&self) -> String {
        let cross = "✗".red().bold();
        match &self.error {
            ConfigError::InvalidEnum {
                field,
                value,
                options,
                hint,
            } => format!(
                "{cross} {}: {} is not one of {options}\n  {}",
                field.cyan(),
                format!("'{value}'").yellow(),
                hint.green()
            ),
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => format!(
                "{} {} must be between {} and {}, got {}",
                cross,
                field.cyan(),
                min.green(),
                max.green(),
                value.red()
            ),
            ConfigError::NotPositive { field } => {
                format!("{} {} must be greater than {}", cross, field.cyan(), "0".green())
            }
            ConfigError::ValidationError { field, message } => {
                format!("{} {}: {}", cross, field.cyan(), message)
            }
            ConfigError::ParseError {
                format,
                location,
                message,
                context,
            } => format!(
                "{cross} invalid {} configuration{}\n  {message}\n{context}",
                format.cyan(),
                location.yellow(),
            ),
            ConfigError::FileNotFound { path } => format!(
                "{cross} configuration file not found: {}",
                path.display().to_string().yellow()
            ),
            _ => self.error.to_string(),
        }
    }
}

fn supports_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && atty::is(atty::Stream::Stderr)
}

impl fmt::Display for ErrorFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}
