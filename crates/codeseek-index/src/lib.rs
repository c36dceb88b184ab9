//! Embedding index for local semantic code search.
//!
//! Files are split into overlapping line windows ([`chunker`]), each window is
//! embedded through an [`embedding::Embedder`], and the vectors are kept in an
//! in-memory [`store::IndexStore`] that can be saved to and loaded from a JSON
//! file. Queries are answered by exact cosine ranking ([`rank`]).

pub mod chunker;
pub mod embedding;
pub mod ids;
pub mod ingest;
pub mod rank;
pub mod store;
pub mod walker;

pub use chunker::{ChunkSpan, Chunker};
pub use embedding::{Embedder, OllamaEmbedder};
pub use ingest::{FileOutcome, IngestOptions, IngestReport, RetryPolicy};
pub use store::{Chunk, Document, DocumentSummary, IndexStats, IndexStore};
