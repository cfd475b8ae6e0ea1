//! Local repository loader: file listing and on-demand content

use crate::error::FetchError;
use crate::traits::FileFetcher;
use async_trait::async_trait;
use codechunk_config::CoreConfig;
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules/**",
    "**/node_modules/**",
    "dist/**",
    "build/**",
    "target/**",
    ".git/**",
];

/// A file of the repository, by path relative to its root
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    /// `/`-separated, relative to the repository root
    pub path: String,
    pub size: u64,
    /// Lower-cased extension, or empty
    pub file_type: String,
}

impl FileRef {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let file_type = Path::new(&path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Self {
            path,
            size,
            file_type,
        }
    }
}

/// Files under `root` matching the include globs and none of the excludes,
/// sorted by path. Respects `.gitignore`.
pub fn scan_directory(root: &Path, config: &CoreConfig) -> Vec<FileRef> {
    let include_set = build_globset(if config.include_paths.is_empty() {
        vec!["**/*".to_string()]
    } else {
        config.include_paths.clone()
    });

    let mut exclude_patterns: Vec<String> = config.exclude_paths.clone();
    exclude_patterns.extend(DEFAULT_EXCLUDES.iter().map(|s| s.to_string()));
    let exclude_set = build_globset(exclude_patterns);

    let mut files = Vec::new();
    for result in WalkBuilder::new(root).build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "error scanning path");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.path();
        let rel_path = path.strip_prefix(root).unwrap_or(path);
        let rel_str = rel_path.to_string_lossy().replace('\\', "/");

        if let Some(set) = &include_set {
            if !set.is_match(&rel_str) {
                continue;
            }
        }
        if let Some(set) = &exclude_set {
            if set.is_match(&rel_str) {
                continue;
            }
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if size > config.max_file_bytes {
            debug!(path = %rel_str, size, "skipping file over max_file_bytes");
            continue;
        }
        files.push(FileRef::new(rel_str, size));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

pub fn build_globset(patterns: Vec<String>) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        match Glob::new(&pat) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => warn!(pattern = %pat, error = %err, "ignoring invalid glob pattern"),
        }
    }
    match builder.build() {
        Ok(set) => Some(set),
        Err(err) => {
            warn!(error = %err, "failed to build globset");
            None
        }
    }
}

/// Reads file content from a local checkout
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileFetcher for FsFetcher {
    async fn fetch(&self, file: &FileRef) -> Result<String, FetchError> {
        let path = self.root.join(&file.path);
        match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8(bytes)
                .map_err(|_| FetchError::Transport(format!("{} is not valid UTF-8", file.path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::NotFound(file.path.clone()))
            }
            Err(e) => Err(FetchError::Transport(e.to_string())),
        }
    }
}
