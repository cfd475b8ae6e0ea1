//! Content-aware chunking of repository files for embedding.
//!
//! [`SplitterRouter`] classifies a [`Document`], runs the matching splitter
//! and always returns at least one [`Chunk`]. [`PostProcessor`] hashes,
//! deduplicates and flattens a batch of chunks for storage.

pub mod chunking;
pub mod classifier;
pub mod error;
pub mod models;
pub mod postprocess;

pub use chunking::{Splitter, SplitterRouter, TokenBudget};
pub use classifier::classify;
pub use error::{Result, SplitError};
pub use models::{
    Chunk, ChunkMetadata, ContentKind, Document, DocumentMetadata, HashInfo, Language,
    SemanticUnit, SplittingMethod, UnitKind,
};
pub use postprocess::{PostProcessor, ProcessedBatch, ProcessedChunk};
