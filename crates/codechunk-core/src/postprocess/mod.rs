//! Chunk post-processing: hashing, stable deduplication, near-duplicate
//! flagging and metadata flattening

pub mod flatten;
pub mod hash;
pub mod simhash;

pub use flatten::{FlatMetadata, FlatValue, FlattenLimits, MetadataValidation};
pub use hash::{ContentHasher, HashAlgorithm};
pub use simhash::{hamming_distance, simhash, SimHashIndex};

use crate::models::{Chunk, HashInfo};
use codechunk_config::DedupConfig;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use tracing::debug;

/// A deduplicated chunk with its storage-ready metadata
#[derive(Debug, Clone)]
pub struct ProcessedChunk {
    pub chunk: Chunk,
    pub metadata: FlatMetadata,
    pub validation: MetadataValidation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PostProcessStats {
    pub input: usize,
    pub exact_duplicates: usize,
    /// Flagged, whether or not they were dropped
    pub near_duplicates: usize,
    pub dropped_near_duplicates: usize,
    pub oversized_metadata: usize,
    pub output: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessedBatch {
    pub chunks: Vec<ProcessedChunk>,
    pub stats: PostProcessStats,
}

pub struct PostProcessor {
    config: DedupConfig,
    hasher: ContentHasher,
    limits: FlattenLimits,
}

impl PostProcessor {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            hasher: ContentHasher::new(config.hash_algorithm),
            limits: FlattenLimits::from(&config),
            config,
        }
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn hash_info(&self, content: &str) -> HashInfo {
        let started = Instant::now();
        let content_hash = self.hasher.hash(content);
        let hash_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        HashInfo {
            content_hash,
            hash_algorithm: self.hasher.algorithm().as_str().to_string(),
            hash_time_ms,
            content_length: content.len(),
            simhash: self
                .config
                .detect_near_duplicates
                .then(|| format!("{:016x}", simhash(content))),
        }
    }

    /// Hash every chunk and remove exact duplicates in one left-to-right pass,
    /// keeping first occurrences in their original order
    pub fn dedup(&self, chunks: Vec<Chunk>) -> (Vec<Chunk>, PostProcessStats) {
        let mut stats = PostProcessStats {
            input: chunks.len(),
            ..Default::default()
        };
        let mut seen = HashSet::with_capacity(chunks.len());
        let mut similar = SimHashIndex::new();
        let mut kept = Vec::with_capacity(chunks.len());

        for mut chunk in chunks {
            let info = self.hash_info(&chunk.content);
            if !seen.insert(info.content_hash.clone()) {
                stats.exact_duplicates += 1;
                continue;
            }

            if self.config.detect_near_duplicates {
                let fingerprint = simhash(&chunk.content);
                let earlier = similar
                    .find(fingerprint, self.config.near_duplicate_distance)
                    .map(str::to_string);
                if let Some(earlier) = earlier {
                    stats.near_duplicates += 1;
                    if self.config.drop_near_duplicates {
                        stats.dropped_near_duplicates += 1;
                        continue;
                    }
                    chunk.metadata.near_duplicate_of = Some(earlier);
                }
                similar.insert(fingerprint, info.content_hash.clone());
            }

            chunk.metadata.hash = Some(info);
            kept.push(chunk);
        }

        stats.output = kept.len();
        (kept, stats)
    }

    pub fn flatten(&self, chunk: &Chunk) -> (FlatMetadata, MetadataValidation) {
        FlatMetadata::flatten(&chunk.metadata, &self.limits)
    }

    /// Dedup, then flatten and validate each surviving chunk's metadata
    pub fn process(&self, chunks: Vec<Chunk>) -> ProcessedBatch {
        let (kept, mut stats) = self.dedup(chunks);
        let chunks: Vec<ProcessedChunk> = kept
            .into_iter()
            .map(|chunk| {
                let (metadata, validation) = self.flatten(&chunk);
                ProcessedChunk {
                    chunk,
                    metadata,
                    validation,
                }
            })
            .collect();
        stats.oversized_metadata = chunks.iter().filter(|c| !c.validation.valid).count();
        debug!(
            input = stats.input,
            output = stats.output,
            exact_duplicates = stats.exact_duplicates,
            near_duplicates = stats.near_duplicates,
            "post-processed batch"
        );
        ProcessedBatch { chunks, stats }
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SplittingMethod;

    fn chunk(content: &str, line: usize) -> Chunk {
        Chunk::new(content, line, line, SplittingMethod::Generic)
    }

    #[test]
    fn test_stable_exact_dedup() {
        let processor = PostProcessor::default();
        let batch = vec![
            chunk("alpha beta gamma delta", 1),
            chunk("one two three four five", 2),
            chunk("alpha beta gamma delta", 3),
            chunk("alpha beta gamma delta", 4),
        ];
        let (kept, stats) = processor.dedup(batch);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].metadata.start_line, 1);
        assert_eq!(kept[1].metadata.start_line, 2);
        assert_eq!(stats.exact_duplicates, 2);
        assert_eq!(stats.output, 2);
    }

    #[test]
    fn test_hash_info_recorded() {
        let processor = PostProcessor::default();
        let (kept, _) = processor.dedup(vec![chunk("fn main() {}", 1)]);
        let info = kept[0].metadata.hash.as_ref().unwrap();
        assert_eq!(info.content_hash, processor.hasher().hash("fn main() {}"));
        assert_eq!(info.hash_algorithm, processor.hasher().algorithm().as_str());
        assert_eq!(info.content_length, 12);
        assert_eq!(info.simhash.as_ref().map(String::len), Some(16));
    }

    #[test]
    fn test_near_duplicates_flagged_or_dropped() {
        let base: String = (0..300).map(|i| format!("token{} ", i % 50)).collect();
        let almost = format!("{base}extra");

        let processor = PostProcessor::default();
        let (kept, stats) = processor.dedup(vec![chunk(&base, 1), chunk(&almost, 2)]);
        assert_eq!(kept.len(), 2);
        assert_eq!(stats.near_duplicates, 1);
        assert_eq!(
            kept[1].metadata.near_duplicate_of.as_deref(),
            Some(processor.hasher().hash(&base).as_str())
        );

        let dropping = PostProcessor::new(DedupConfig {
            drop_near_duplicates: true,
            ..Default::default()
        });
        let (kept, stats) = dropping.dedup(vec![chunk(&base, 1), chunk(&almost, 2)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(stats.dropped_near_duplicates, 1);
    }

    #[test]
    fn test_process_flags_oversized_metadata() {
        let processor = PostProcessor::new(DedupConfig {
            max_metadata_bytes: 64,
            ..Default::default()
        });
        let batch = processor.process(vec![chunk("some content here", 1)]);
        assert_eq!(batch.chunks.len(), 1);
        assert!(!batch.chunks[0].validation.valid);
        assert_eq!(batch.stats.oversized_metadata, 1);
    }
}
