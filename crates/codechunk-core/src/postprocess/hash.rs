//! Content hashing with a fast primary algorithm and a sha256 fallback

use codechunk_config::HashAlgorithmChoice;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    #[cfg(feature = "fast-hash")]
    Xxh3,
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            #[cfg(feature = "fast-hash")]
            HashAlgorithm::Xxh3 => "xxh3_64",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    /// Fastest algorithm compiled into this build
    pub fn fastest() -> Self {
        #[cfg(feature = "fast-hash")]
        {
            HashAlgorithm::Xxh3
        }
        #[cfg(not(feature = "fast-hash"))]
        {
            HashAlgorithm::Sha256
        }
    }

    /// Resolve a configured choice; an unavailable `xxh3` degrades to sha256
    pub fn resolve(choice: HashAlgorithmChoice) -> Self {
        match choice {
            HashAlgorithmChoice::Auto => Self::fastest(),
            HashAlgorithmChoice::Sha256 => HashAlgorithm::Sha256,
            HashAlgorithmChoice::Xxh3 => {
                let resolved = Self::fastest();
                if resolved == HashAlgorithm::Sha256 {
                    warn!("xxh3 requested but not compiled in (feature `fast-hash`), using sha256");
                }
                resolved
            }
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hashes chunk content with one algorithm fixed for its lifetime
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    pub fn new(choice: HashAlgorithmChoice) -> Self {
        Self {
            algorithm: HashAlgorithm::resolve(choice),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hex digest of `content`
    pub fn hash(&self, content: &str) -> String {
        match self.algorithm {
            #[cfg(feature = "fast-hash")]
            HashAlgorithm::Xxh3 => format!("{:016x}", xxhash_rust::xxh3::xxh3_64(content.as_bytes())),
            HashAlgorithm::Sha256 => sha256_hex(content),
        }
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(HashAlgorithmChoice::Auto)
    }
}

fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// 64-bit feature hash used by SimHash
pub(crate) fn feature_hash(feature: &str) -> u64 {
    #[cfg(feature = "fast-hash")]
    {
        xxhash_rust::xxh3::xxh3_64(feature.as_bytes())
    }
    #[cfg(not(feature = "fast-hash"))]
    {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}
