//! Supported config file formats

use crate::error::{ConfigError, Position};
use crate::{Config, Result};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
    Json,
}

impl ConfigFormat {
    /// Format by file extension, case-insensitive
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("yml" | "yaml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnknownFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }

    /// Deserialize a config; `origin` names the source in errors
    pub fn parse(self, content: &str, origin: Option<&str>) -> Result<Config> {
        let parsed: std::result::Result<Config, (String, Option<Position>)> = match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| {
                let position = e.location().map(|l| Position::new(l.line(), l.column()));
                (e.to_string(), position)
            }),
            Self::Toml => toml::from_str(content).map_err(|e| {
                let position = e.span().map(|s| Position::at_offset(content, s.start));
                (e.message().to_string(), position)
            }),
            Self::Json => serde_json::from_str(content)
                .map_err(|e| (e.to_string(), Some(Position::new(e.line(), e.column())))),
        };
        parsed.map_err(|(message, position)| {
            ConfigError::parse(self.name(), message, content, position, origin)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HashAlgorithmChoice, OversizeStrategy};

    #[test]
    fn test_format_from_extension() {
        let cases = [
            ("a/.codechunk.yml", ConfigFormat::Yaml),
            ("config.YAML", ConfigFormat::Yaml),
            ("config.toml", ConfigFormat::Toml),
            ("config.json", ConfigFormat::Json),
        ];
        for (path, expected) in cases {
            assert_eq!(ConfigFormat::from_path(Path::new(path)).unwrap(), expected);
        }
        assert!(matches!(
            ConfigFormat::from_path(Path::new("config.ini")),
            Err(ConfigError::UnknownFormat { .. })
        ));
        assert!(ConfigFormat::from_path(Path::new("Makefile")).is_err());
    }

    #[test]
    fn test_yaml_section_overrides() {
        let yaml = "chunking:\n  max_tokens: 256\n  oversize: truncate\n";
        let config = ConfigFormat::Yaml.parse(yaml, None).unwrap();
        assert_eq!(config.chunking.max_tokens, 256);
        assert_eq!(config.chunking.oversize, OversizeStrategy::Truncate);
        assert_eq!(config.pool, Default::default());
    }

    #[test]
    fn test_empty_yaml_mapping_is_default() {
        assert_eq!(ConfigFormat::Yaml.parse("{}", None).unwrap(), Config::default());
    }

    #[test]
    fn test_toml_fills_missing_fields() {
        let toml = "[rate_limit]\nmax_requests_per_window = 100\nwindow_secs = 60\n";
        let config = ConfigFormat::Toml.parse(toml, None).unwrap();
        assert_eq!(config.rate_limit.max_requests_per_window, 100);
        assert_eq!(config.rate_limit.throttle_ratio, 0.9);
    }

    #[test]
    fn test_json_enum_values() {
        let json = r#"{ "dedup": { "hash_algorithm": "sha256", "max_list_len": 8 } }"#;
        let config = ConfigFormat::Json.parse(json, None).unwrap();
        assert_eq!(config.dedup.max_list_len, 8);
        assert_eq!(config.dedup.hash_algorithm, HashAlgorithmChoice::Sha256);
    }

    #[test]
    fn test_errors_name_format_and_origin() {
        let toml = "[pool]\nmax_workers = \"four\"\n";
        let msg = ConfigFormat::Toml
            .parse(toml, Some("c.toml"))
            .unwrap_err()
            .to_string();
        assert!(msg.starts_with("invalid TOML configuration in c.toml at line 2"));

        let yaml = "chunking:\n  oversize: halve\n";
        let msg = ConfigFormat::Yaml.parse(yaml, None).unwrap_err().to_string();
        assert!(msg.starts_with("invalid YAML configuration"));

        let json = r#"{ "dedup": { "hash_algorithm": "md5" } }"#;
        assert!(ConfigFormat::Json.parse(json, None).is_err());
    }
}
