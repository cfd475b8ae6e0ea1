//! Hashing, deduplication and metadata limits

use serde::{Deserialize, Serialize};

/// Configuration for the chunk post-processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Content hash algorithm
    #[serde(default)]
    pub hash_algorithm: HashAlgorithmChoice,

    /// Compute SimHash fingerprints and flag near-duplicates
    #[serde(default = "default_detect_near")]
    pub detect_near_duplicates: bool,

    /// Maximum Hamming distance between fingerprints to count as near-duplicate
    #[serde(default = "default_near_distance")]
    pub near_duplicate_distance: u32,

    /// Drop flagged near-duplicates instead of only tagging them
    #[serde(default)]
    pub drop_near_duplicates: bool,

    /// Hard cap on the serialized size of flattened metadata
    ///
    /// Vector stores commonly cap metadata per record (40 KiB is a common limit).
    #[serde(default = "default_max_metadata_bytes")]
    pub max_metadata_bytes: usize,

    /// Longest list kept in flattened metadata
    #[serde(default = "default_max_list_len")]
    pub max_list_len: usize,

    /// Longest string value kept in flattened metadata (characters)
    #[serde(default = "default_max_string_len")]
    pub max_string_len: usize,
}

/// Which content hash to use
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithmChoice {
    /// Fastest algorithm compiled into this build
    #[default]
    Auto,
    /// 64-bit xxh3; degrades to sha256 when not compiled in
    Xxh3,
    /// SHA-256
    Sha256,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithmChoice::Auto,
            detect_near_duplicates: default_detect_near(),
            near_duplicate_distance: default_near_distance(),
            drop_near_duplicates: false,
            max_metadata_bytes: default_max_metadata_bytes(),
            max_list_len: default_max_list_len(),
            max_string_len: default_max_string_len(),
        }
    }
}

impl crate::validation::Validate for DedupConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{invalid, validate_positive};

        validate_positive("dedup.max_metadata_bytes", self.max_metadata_bytes as u64)?;
        validate_positive("dedup.max_list_len", self.max_list_len as u64)?;
        validate_positive("dedup.max_string_len", self.max_string_len as u64)?;
        if self.near_duplicate_distance > 32 {
            return Err(invalid(
                "dedup.near_duplicate_distance",
                format!(
                    "{} is more than half of a 64-bit fingerprint",
                    self.near_duplicate_distance
                ),
            ));
        }
        Ok(())
    }
}

fn default_detect_near() -> bool {
    true
}

fn default_near_distance() -> u32 {
    3
}

fn default_max_metadata_bytes() -> usize {
    40 * 1024
}

fn default_max_list_len() -> usize {
    32
}

fn default_max_string_len() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn test_default_is_valid() {
        assert!(DedupConfig::default().validate().is_ok());
    }

    #[test]
    fn test_distance_bound() {
        let config = DedupConfig {
            near_duplicate_distance: 40,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_algorithm_serialization() {
        assert_eq!(
            serde_json::to_string(&HashAlgorithmChoice::Sha256).unwrap(),
            "\"sha256\""
        );
        let parsed: HashAlgorithmChoice = serde_yaml::from_str("xxh3").unwrap();
        assert_eq!(parsed, HashAlgorithmChoice::Xxh3);
    }
}
