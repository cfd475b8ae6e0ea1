//! Which repository files are loaded

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Globs a path must match to be loaded, e.g. `["src/**/*.rs", "docs/**"]`
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<String>,

    /// Globs that veto an included path, applied after `.gitignore`
    #[serde(default)]
    pub exclude_paths: Vec<String>,

    /// Larger files are left out of the plan
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            include_paths: default_include_paths(),
            exclude_paths: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

impl crate::validation::Validate for CoreConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{invalid, validate_positive};

        if self.include_paths.is_empty() {
            return Err(invalid("core.include_paths", "nothing would be loaded"));
        }
        if let Some(index) = self.include_paths.iter().position(|p| p.trim().is_empty()) {
            return Err(invalid(
                "core.include_paths",
                format!("pattern {index} is blank"),
            ));
        }
        validate_positive("core.max_file_bytes", self.max_file_bytes)
    }
}

fn default_include_paths() -> Vec<String> {
    vec!["**/*".to_string()]
}

fn default_max_file_bytes() -> u64 {
    1 << 20
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn test_defaults_load_everything() {
        let config = CoreConfig::default();
        assert_eq!(config.include_paths, vec!["**/*"]);
        assert_eq!(config.max_file_bytes, 1_048_576);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_no_include_patterns() {
        let config = CoreConfig {
            include_paths: vec![],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("nothing would be loaded"));
    }

    #[test]
    fn test_blank_pattern_is_reported_by_index() {
        let config = CoreConfig {
            include_paths: vec!["src/**".to_string(), "  ".to_string()],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pattern 1 is blank"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: CoreConfig = serde_yaml::from_str("exclude_paths: ['**/vendor/**']").unwrap();
        assert_eq!(config.include_paths, vec!["**/*"]);
        assert_eq!(config.exclude_paths, vec!["**/vendor/**"]);
    }
}
