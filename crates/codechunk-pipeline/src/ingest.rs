//! Central ingest stage: the single writer to the chunk store

use crate::planner::{JobId, UnitId};
use crate::traits::{ChunkStore, ItemStatus, PreparedChunk};
use anyhow::Result;
use codechunk_config::DedupConfig;
use codechunk_core::{Chunk, PostProcessor};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Chunks of one file batch, sent by a worker
#[derive(Debug, Clone)]
pub struct ChunkBatch {
    pub job_id: JobId,
    pub unit_id: UnitId,
    pub namespace: String,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub batches: usize,
    pub chunks_in: usize,
    pub exact_duplicates: usize,
    pub near_duplicates: usize,
    pub oversized_metadata: usize,
    pub stored: usize,
    pub failed: usize,
}

impl IngestStats {
    fn merge(&mut self, other: IngestStats) {
        self.batches += other.batches;
        self.chunks_in += other.chunks_in;
        self.exact_duplicates += other.exact_duplicates;
        self.near_duplicates += other.near_duplicates;
        self.oversized_metadata += other.oversized_metadata;
        self.stored += other.stored;
        self.failed += other.failed;
    }
}

pub struct Ingestor {
    processor: PostProcessor,
    store: Arc<dyn ChunkStore>,
    max_metadata_bytes: usize,
    /// Content hashes already stored, per namespace
    stored: HashMap<String, HashSet<String>>,
}

impl Ingestor {
    pub fn new(config: &DedupConfig, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            processor: PostProcessor::new(config.clone()),
            store,
            max_metadata_bytes: config.max_metadata_bytes,
            stored: HashMap::new(),
        }
    }

    /// Consume batches until every sender is dropped
    pub async fn run(mut self, mut batches: mpsc::Receiver<ChunkBatch>) -> IngestStats {
        let mut total = IngestStats::default();
        while let Some(batch) = batches.recv().await {
            total.merge(self.ingest(batch).await);
        }
        info!(
            batches = total.batches,
            chunks_in = total.chunks_in,
            stored = total.stored,
            failed = total.failed,
            exact_duplicates = total.exact_duplicates,
            "ingest finished"
        );
        total
    }

    /// Dedup, flatten and store one batch. Store errors are counted, not returned.
    pub async fn ingest(&mut self, batch: ChunkBatch) -> IngestStats {
        let mut stats = IngestStats {
            batches: 1,
            chunks_in: batch.chunks.len(),
            ..Default::default()
        };
        let processed = self.processor.process(batch.chunks);
        stats.exact_duplicates = processed.stats.exact_duplicates;
        stats.near_duplicates = processed.stats.near_duplicates;
        stats.oversized_metadata = processed.stats.oversized_metadata;

        let seen = self.stored.entry(batch.namespace.clone()).or_default();
        let mut prepared = Vec::with_capacity(processed.chunks.len());
        for mut item in processed.chunks {
            let Some(id) = item.chunk.metadata.hash.as_ref().map(|h| h.content_hash.clone()) else {
                continue;
            };
            if seen.contains(&id) {
                stats.exact_duplicates += 1;
                continue;
            }
            if !item.validation.valid {
                let shrunk = item.metadata.shrink_to_fit(self.max_metadata_bytes);
                if !shrunk.valid {
                    warn!(chunk_id = %id, size = shrunk.size, "metadata over limit after shrinking");
                }
            }
            prepared.push(PreparedChunk {
                id,
                content: item.chunk.content,
                metadata: item.metadata,
            });
        }
        if prepared.is_empty() {
            return stats;
        }

        match store(self.store.as_ref(), &batch.namespace, &prepared).await {
            Ok(statuses) => {
                for (chunk, status) in prepared.iter().zip(statuses) {
                    match status {
                        ItemStatus::Stored => {
                            stats.stored += 1;
                            seen.insert(chunk.id.clone());
                        }
                        ItemStatus::Failed(reason) => {
                            stats.failed += 1;
                            debug!(chunk_id = %chunk.id, reason = %reason, "chunk not stored");
                        }
                    }
                }
            }
            Err(error) => {
                stats.failed += prepared.len();
                warn!(
                    job_id = %batch.job_id,
                    unit_id = %batch.unit_id,
                    namespace = %batch.namespace,
                    error = %error,
                    "upsert failed"
                );
            }
        }
        stats
    }
}

/// Upsert, treating a short status list as failures for the missing items
async fn store(
    store: &dyn ChunkStore,
    namespace: &str,
    chunks: &[PreparedChunk],
) -> Result<Vec<ItemStatus>> {
    let mut statuses = store.upsert(namespace, chunks).await?;
    statuses.resize(chunks.len(), ItemStatus::Failed("no status returned".to_string()));
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codechunk_core::SplittingMethod;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        upserts: Mutex<Vec<(String, Vec<PreparedChunk>)>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl ChunkStore for MemoryStore {
        async fn upsert(&self, namespace: &str, chunks: &[PreparedChunk]) -> Result<Vec<ItemStatus>> {
            self.upserts
                .lock()
                .unwrap()
                .push((namespace.to_string(), chunks.to_vec()));
            Ok(chunks
                .iter()
                .map(|c| match &self.reject {
                    Some(word) if c.content.contains(word.as_str()) => {
                        ItemStatus::Failed("rejected".to_string())
                    }
                    _ => ItemStatus::Stored,
                })
                .collect())
        }
    }

    fn batch(namespace: &str, contents: &[&str]) -> ChunkBatch {
        let job_id = JobId(1);
        ChunkBatch {
            job_id,
            unit_id: UnitId { job: job_id, index: 0 },
            namespace: namespace.to_string(),
            chunks: contents
                .iter()
                .map(|c| Chunk::new(*c, 1, 1, SplittingMethod::Generic))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_ingest_dedups_and_stores() {
        let store = Arc::new(MemoryStore::default());
        let mut ingestor = Ingestor::new(&DedupConfig::default(), store.clone());

        let stats = ingestor
            .ingest(batch("acme", &["fn a() {}", "fn b() {}", "fn a() {}"]))
            .await;
        assert_eq!(stats.chunks_in, 3);
        assert_eq!(stats.exact_duplicates, 1);
        assert_eq!(stats.stored, 2);

        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].0, "acme");
        assert_eq!(upserts[0].1[0].content, "fn a() {}");
        assert!(upserts[0].1[0].metadata.get("hash_content_hash").is_some());
    }

    #[tokio::test]
    async fn test_stored_hashes_are_not_resent() {
        let store = Arc::new(MemoryStore::default());
        let mut ingestor = Ingestor::new(&DedupConfig::default(), store.clone());

        ingestor.ingest(batch("acme", &["fn a() {}"])).await;
        let again = ingestor.ingest(batch("acme", &["fn a() {}"])).await;
        assert_eq!(again.exact_duplicates, 1);
        assert_eq!(again.stored, 0);

        // other namespaces are independent
        let other = ingestor.ingest(batch("other", &["fn a() {}"])).await;
        assert_eq!(other.stored, 1);
        assert_eq!(store.upserts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_items_are_counted() {
        let store = Arc::new(MemoryStore {
            reject: Some("secret".to_string()),
            ..Default::default()
        });
        let mut ingestor = Ingestor::new(&DedupConfig::default(), store);
        let stats = ingestor
            .ingest(batch("acme", &["public text here", "secret text here"]))
            .await;
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_run_sums_batches() {
        let store = Arc::new(MemoryStore::default());
        let ingestor = Ingestor::new(&DedupConfig::default(), store);
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(ingestor.run(rx));

        tx.send(batch("acme", &["one two three"])).await.unwrap();
        tx.send(batch("acme", &["four five six"])).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.batches, 2);
        assert_eq!(stats.stored, 2);
    }
}
