//! End to end over a local checkout

use anyhow::Result;
use async_trait::async_trait;
use codechunk_config::Config;
use codechunk_core::postprocess::FlatValue;
use codechunk_pipeline::{ChunkStore, ItemStatus, JobSpec, JobStatus, Pipeline, PreparedChunk};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct MemoryStore {
    chunks: Mutex<Vec<(String, PreparedChunk)>>,
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn upsert(&self, namespace: &str, chunks: &[PreparedChunk]) -> Result<Vec<ItemStatus>> {
        let mut stored = self.chunks.lock().unwrap();
        stored.extend(chunks.iter().map(|c| (namespace.to_string(), c.clone())));
        Ok(vec![ItemStatus::Stored; chunks.len()])
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

const ADD_JS: &str = "function add(a, b) {\n  return a + b;\n}\n\nmodule.exports = add;\n";

#[tokio::test]
async fn test_local_repository_is_chunked_and_stored() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/add.js", ADD_JS);
    write(dir.path(), "lib/add_copy.js", ADD_JS);
    write(dir.path(), "package.json", "{\"name\": \"x\", \"version\": \"1.0.0\"}\n");
    write(
        dir.path(),
        "README.md",
        "# Demo\n\nA tiny project used to exercise the pipeline.\n",
    );
    write(dir.path(), "node_modules/dep/index.js", "module.exports = 1;\n");

    let mut config = Config::default();
    config.pool.max_workers = 2;
    let store = Arc::new(MemoryStore::default());
    let pipeline = Pipeline::new(config, store.clone());

    let spec = JobSpec::new("acme/demo").with_branch("main").with_namespace("demo");
    let report = pipeline.run_local(dir.path(), spec).await.unwrap();

    assert_eq!(report.job.status, JobStatus::Success);
    assert_eq!(report.job.files_processed, 4);
    assert_eq!(report.ingest.chunks_in, report.job.chunks_produced);
    assert!(report.ingest.exact_duplicates >= 1);
    assert!(report.ingest.stored > 0);
    assert!(report.ingest.stored + report.ingest.exact_duplicates <= report.ingest.chunks_in);

    let stored = store.chunks.lock().unwrap();
    assert_eq!(stored.len(), report.ingest.stored);
    assert!(stored.iter().all(|(ns, _)| ns == "demo"));
    let paths: Vec<_> = stored
        .iter()
        .filter_map(|(_, c)| match c.metadata.get("source_path") {
            Some(FlatValue::Str(path)) => Some(path.as_str()),
            _ => None,
        })
        .collect();
    assert!(!paths.iter().any(|p| p.contains("node_modules")));
    assert!(paths.contains(&"package.json"));
    assert!(stored
        .iter()
        .all(|(_, c)| c.metadata.get("repo_id") == Some(&FlatValue::Str("acme/demo".to_string()))));
}

#[tokio::test]
async fn test_empty_repository_reports_success() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::default());
    let pipeline = Pipeline::new(Config::default(), store.clone());
    let report = pipeline
        .run_local(dir.path(), JobSpec::new("acme/empty"))
        .await
        .unwrap();

    assert_eq!(report.job.status, JobStatus::Success);
    assert_eq!(report.job.total_units, 0);
    assert_eq!(report.job.files_processed, 0);
    assert_eq!(report.ingest.batches, 0);
    assert!(store.chunks.lock().unwrap().is_empty());
}
