use super::{
    CodeSplitter, EmergencySplitter, JsonConfigSplitter, JsonSchemaSplitter,
    MarkdownChunkSplitter, OpenApiSplitter, ProseSplitter, Splitter, TokenBudget,
    YamlConfigSplitter,
};
use crate::classifier::classify;
use crate::error::SplitError;
use crate::models::{Chunk, ContentKind, Document, Language, SplittingMethod};
use codechunk_config::{ChunkingConfig, Config, FallbackConfig};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Classifies documents and dispatches them to the matching splitter.
///
/// `route` never fails and never returns an empty list: a failing splitter
/// is replaced by the emergency fixed-size splitter, and when that yields
/// nothing the whole document becomes one `no_splitting_applied` chunk.
pub struct SplitterRouter {
    chunking: ChunkingConfig,
    code: CodeSplitter,
    markdown: MarkdownChunkSplitter,
    openapi: OpenApiSplitter,
    json_schema: JsonSchemaSplitter,
    yaml: YamlConfigSplitter,
    json: JsonConfigSplitter,
    documentation: ProseSplitter,
    generic: ProseSplitter,
    emergency: EmergencySplitter,
}

impl SplitterRouter {
    pub fn new(config: &Config) -> Self {
        Self::with_configs(config.chunking.clone(), &config.fallback)
    }

    pub fn with_configs(chunking: ChunkingConfig, fallback: &FallbackConfig) -> Self {
        let budget = TokenBudget::from_config(&chunking);
        Self {
            code: CodeSplitter::new(chunking.clone()),
            markdown: MarkdownChunkSplitter::new(budget),
            openapi: OpenApiSplitter::new(budget),
            json_schema: JsonSchemaSplitter::new(budget),
            yaml: YamlConfigSplitter::new(budget),
            json: JsonConfigSplitter::new(budget),
            documentation: ProseSplitter::documentation(budget),
            generic: ProseSplitter::generic(budget),
            emergency: EmergencySplitter::new(fallback),
            chunking,
        }
    }

    pub fn splitter_for(&self, kind: ContentKind) -> &dyn Splitter {
        match kind {
            ContentKind::Code => &self.code,
            ContentKind::Markdown => &self.markdown,
            ContentKind::OpenApi => &self.openapi,
            ContentKind::JsonSchema => &self.json_schema,
            ContentKind::YamlConfig => &self.yaml,
            ContentKind::JsonConfig => &self.json,
            ContentKind::Documentation => &self.documentation,
            ContentKind::Generic => &self.generic,
        }
    }

    pub fn route(&self, doc: &Document) -> Vec<Chunk> {
        let kind = classify(doc);
        let splitter = self.splitter_for(kind);
        debug!(path = doc.path(), kind = %kind, method = %splitter.method(), "routing document");

        let chunks = match run(splitter, doc) {
            Ok(chunks) if !chunks.is_empty() => chunks,
            Ok(_) => vec![whole_document(doc, SplitError::Empty.reason())],
            Err(err) => {
                warn!(
                    path = doc.path(),
                    kind = %kind,
                    error = %err,
                    "splitter failed, using emergency fixed-size splitter"
                );
                let reason = err.reason();
                match run(&self.emergency, doc) {
                    Ok(chunks) if !chunks.is_empty() => chunks
                        .into_iter()
                        .map(|c| c.with_fallback_reason(reason))
                        .collect(),
                    _ => vec![whole_document(doc, reason)],
                }
            }
        };

        self.stamp(doc, kind, chunks)
    }

    /// Copy document metadata onto each chunk and number them in emission order
    fn stamp(&self, doc: &Document, kind: ContentKind, chunks: Vec<Chunk>) -> Vec<Chunk> {
        let language = match kind {
            ContentKind::Code => Some(Language::from_path(doc.path())),
            _ => None,
        };
        let meta = &doc.metadata;
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, mut chunk)| {
                let m = &mut chunk.metadata;
                m.source_path = meta.source_path.clone();
                m.repo_id = meta.repo_id.clone();
                m.branch = meta.branch.clone();
                m.commit_hash = meta.commit_hash.clone();
                m.file_type = meta.file_type.clone();
                m.extra = meta.extra.clone();
                m.content_kind = kind;
                m.language = language;
                m.chunk_index = index;
                m.token_count = self.chunking.estimate_tokens(&chunk.content);
                chunk
            })
            .collect()
    }
}

fn run(splitter: &dyn Splitter, doc: &Document) -> Result<Vec<Chunk>, SplitError> {
    catch_unwind(AssertUnwindSafe(|| splitter.split(doc)))
        .unwrap_or_else(|_| Err(SplitError::Internal(format!("{} splitter panicked", splitter.method()))))
}

fn whole_document(doc: &Document, reason: &str) -> Chunk {
    let lines = doc.content.trim_end_matches('\n').lines().count();
    Chunk::new(
        doc.content.clone(),
        usize::from(lines > 0),
        lines,
        SplittingMethod::NoSplittingApplied,
    )
    .with_fallback_reason(reason)
}
