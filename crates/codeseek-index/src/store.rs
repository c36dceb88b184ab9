//! In-memory embedding index with JSON persistence.
//!
//! The store owns two maps, documents and chunks, plus the ID allocator they
//! share, all behind one reader/writer lock. Searches take the read side.
//! Inserts, resets, and the final swap of a load take the write side. Network
//! calls (embedding) never happen while the lock is held: callers compute
//! vectors first and hand finished chunks to [`IndexStore::insert_document`].

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use codeseek_core::{CodeseekError, SearchResult};
use serde::{Deserialize, Serialize};

use crate::chunker::ChunkSpan;
use crate::embedding::Embedder;
use crate::ids::IdAllocator;
use crate::rank;

/// Version tag written into every saved index.
pub const RECORD_VERSION: u32 = 1;

/// An ingested file.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeseek_index::store::Document;
///
/// let doc = Document {
///     id: 1,
///     path: PathBuf::from("src/main.go"),
///     full_content: "package main".into(),
///     chunk_ids: vec![2],
/// };
/// assert_eq!(doc.chunk_ids.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Unique ID, drawn from the same counter as chunk IDs.
    pub id: u64,
    /// Path as walked, including the ingestion root.
    pub path: PathBuf,
    /// The file's full text at ingestion time.
    pub full_content: String,
    /// IDs of this document's chunks, in line order.
    pub chunk_ids: Vec<u64>,
}

/// An embedded line window of a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Unique ID, drawn from the same counter as document IDs.
    pub id: u64,
    /// Owning document.
    pub document_id: u64,
    /// First line (1-indexed).
    pub start_line: u32,
    /// Last line (inclusive).
    pub end_line: u32,
    /// The window's text.
    pub content: String,
    /// Embedding of `content`.
    pub vector: Vec<f32>,
}

/// What was stored for one ingested file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    /// ID allocated to the document.
    pub document_id: u64,
    /// Path as walked, including the ingestion root.
    pub path: PathBuf,
    /// Number of chunks stored for it.
    pub chunks: usize,
}

/// Index statistics.
///
/// `dimensions` lists every distinct vector length present. More than one
/// entry means the embedding model changed between ingestion runs and the
/// stale vectors will score zero against new queries.
///
/// # Examples
///
/// ```
/// use codeseek_index::store::IndexStore;
///
/// let store = IndexStore::new();
/// store.reset();
/// let stats = store.stats().unwrap();
/// assert_eq!(stats.total_chunks, 0);
/// assert!(stats.dimensions.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    /// Number of documents.
    pub total_documents: usize,
    /// Number of chunks.
    pub total_chunks: usize,
    /// Distinct vector dimensions present.
    pub dimensions: BTreeSet<usize>,
}

#[derive(Debug, Default)]
struct IndexState {
    documents: BTreeMap<u64, Document>,
    chunks: BTreeMap<u64, Chunk>,
    ids: IdAllocator,
}

#[derive(Serialize)]
struct IndexRecordRef<'a> {
    version: u32,
    documents: &'a BTreeMap<u64, Document>,
    chunks: &'a BTreeMap<u64, Chunk>,
}

#[derive(Deserialize)]
struct IndexRecord {
    version: u32,
    documents: BTreeMap<u64, Document>,
    chunks: BTreeMap<u64, Chunk>,
}

impl IndexState {
    /// Rebuild state from a decoded record, rejecting anything inconsistent.
    fn from_record(record: IndexRecord) -> Result<Self, CodeseekError> {
        if record.version != RECORD_VERSION {
            return Err(CodeseekError::Format(format!(
                "unsupported index version {} (expected {RECORD_VERSION})",
                record.version
            )));
        }

        for (key, doc) in &record.documents {
            if *key != doc.id {
                return Err(CodeseekError::Format(format!(
                    "document stored under key {key} has id {}",
                    doc.id
                )));
            }
            if record.chunks.contains_key(key) {
                return Err(CodeseekError::Format(format!(
                    "id {key} is used by both a document and a chunk"
                )));
            }
            for chunk_id in &doc.chunk_ids {
                match record.chunks.get(chunk_id) {
                    Some(chunk) if chunk.document_id == doc.id => {}
                    Some(_) => {
                        return Err(CodeseekError::Format(format!(
                            "chunk {chunk_id} is listed by document {} but owned by another",
                            doc.id
                        )))
                    }
                    None => {
                        return Err(CodeseekError::Format(format!(
                            "document {} references missing chunk {chunk_id}",
                            doc.id
                        )))
                    }
                }
            }
        }

        for (key, chunk) in &record.chunks {
            if *key != chunk.id {
                return Err(CodeseekError::Format(format!(
                    "chunk stored under key {key} has id {}",
                    chunk.id
                )));
            }
            if chunk.start_line == 0 || chunk.start_line > chunk.end_line {
                return Err(CodeseekError::Format(format!(
                    "chunk {} has invalid line range {}-{}",
                    chunk.id, chunk.start_line, chunk.end_line
                )));
            }
            let listed = record
                .documents
                .get(&chunk.document_id)
                .is_some_and(|doc| doc.chunk_ids.contains(&chunk.id));
            if !listed {
                return Err(CodeseekError::Format(format!(
                    "chunk {} is not listed by document {}",
                    chunk.id, chunk.document_id
                )));
            }
        }

        let max_id = record
            .documents
            .keys()
            .chain(record.chunks.keys())
            .copied()
            .max();

        if max_id == Some(u64::MAX) {
            return Err(CodeseekError::Format(format!(
                "id {} leaves no room for new entries",
                u64::MAX
            )));
        }

        Ok(Self {
            documents: record.documents,
            chunks: record.chunks,
            ids: IdAllocator::resume_after(max_id),
        })
    }
}

/// Thread-safe embedding index.
///
/// A fresh store holds no index: [`search`](Self::search) and
/// [`save`](Self::save) report [`CodeseekError::NotFound`] until an index is
/// loaded, ingested, or [`reset`](Self::reset).
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeseek_index::chunker::ChunkSpan;
/// use codeseek_index::store::IndexStore;
///
/// let store = IndexStore::new();
/// let span = ChunkSpan { start_line: 1, end_line: 1, text: "fn main() {}".into() };
/// store
///     .insert_document(PathBuf::from("main.rs"), "fn main() {}".into(), vec![(span, vec![1.0, 0.0])])
///     .unwrap();
///
/// let hits = store.search(&[1.0, 0.0], 5).unwrap();
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].path, PathBuf::from("main.rs"));
/// ```
#[derive(Debug, Default)]
pub struct IndexStore {
    state: RwLock<Option<IndexState>>,
}

impl IndexStore {
    /// Create a store with no index loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store and load the index saved at `path`.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn open(path: &Path) -> Result<Self, CodeseekError> {
        let store = Self::new();
        store.load(path)?;
        Ok(store)
    }

    /// Whether an index is present (loaded, ingested, or reset).
    pub fn is_loaded(&self) -> bool {
        self.read().is_some()
    }

    /// Discard everything and start an empty index with IDs from 1.
    pub fn reset(&self) {
        *self.write() = Some(IndexState::default());
    }

    /// Start an empty index if none is present yet; keep an existing one.
    pub(crate) fn ensure_loaded(&self) {
        let mut guard = self.write();
        if guard.is_none() {
            *guard = Some(IndexState::default());
        }
    }

    /// Store a file and its already-embedded chunks.
    ///
    /// Takes the write lock once: allocates the document ID, then one ID per
    /// chunk in order, and inserts everything. Re-inserting a path adds a new
    /// document; existing entries are never updated in place.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Internal`] if the ID space is exhausted. The
    /// maps are left unchanged in that case.
    pub fn insert_document(
        &self,
        path: PathBuf,
        full_content: String,
        chunks: Vec<(ChunkSpan, Vec<f32>)>,
    ) -> Result<DocumentSummary, CodeseekError> {
        let mut guard = self.write();
        let state = guard.get_or_insert_with(IndexState::default);

        if let Some(existing) = state.chunks.values().next().map(|c| c.vector.len()) {
            if chunks.iter().any(|(_, v)| v.len() != existing) {
                tracing::warn!(
                    existing,
                    "{} has vectors of a different dimension; consider rebuilding the index",
                    path.display()
                );
            }
        }

        let document_id = state.ids.next_id()?;
        let chunk_ids = (0..chunks.len())
            .map(|_| state.ids.next_id())
            .collect::<Result<Vec<_>, _>>()?;

        for (id, (span, vector)) in chunk_ids.iter().copied().zip(chunks) {
            state.chunks.insert(
                id,
                Chunk {
                    id,
                    document_id,
                    start_line: span.start_line,
                    end_line: span.end_line,
                    content: span.text,
                    vector,
                },
            );
        }

        let summary = DocumentSummary {
            document_id,
            path: path.clone(),
            chunks: chunk_ids.len(),
        };

        state.documents.insert(
            document_id,
            Document {
                id: document_id,
                path,
                full_content,
                chunk_ids,
            },
        );

        tracing::debug!(
            document_id,
            chunks = summary.chunks,
            "stored {}",
            summary.path.display()
        );
        Ok(summary)
    }

    /// Rank stored chunks against `query` and return the best `limit`.
    ///
    /// A `limit` of zero means [`rank::DEFAULT_LIMIT`]. An empty index yields
    /// an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::NotFound`] if no index is present, or
    /// [`CodeseekError::Internal`] if a chunk's document is missing.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>, CodeseekError> {
        let guard = self.read();
        let state = guard.as_ref().ok_or_else(not_loaded)?;

        let corpus = state
            .chunks
            .values()
            .map(|chunk| {
                state
                    .documents
                    .get(&chunk.document_id)
                    .map(|doc| (chunk, doc))
                    .ok_or_else(|| {
                        CodeseekError::Internal(format!(
                            "chunk {} belongs to missing document {}",
                            chunk.id, chunk.document_id
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rank::rank(query, corpus, limit))
    }

    /// Embed `query` with `embedder` and [`search`](Self::search) with it.
    ///
    /// The presence check runs first, so a missing index is reported without
    /// calling the embedding service.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::NotFound`] if no index is present, or the
    /// embedder's error.
    pub async fn search_text<E: Embedder>(
        &self,
        embedder: &E,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, CodeseekError> {
        if !self.is_loaded() {
            return Err(not_loaded());
        }
        let vector = embedder.embed(query).await?;
        self.search(&vector, limit)
    }

    /// Write the index to `path` as JSON.
    ///
    /// The read lock is held only while serializing. The bytes go to a
    /// uniquely named temp file in the target directory, which is then
    /// renamed into place; a failed write or rename removes it. Parent
    /// directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::NotFound`] if no index is present, or
    /// [`CodeseekError::Io`] if writing fails.
    pub fn save(&self, path: &Path) -> Result<(), CodeseekError> {
        let bytes = {
            let guard = self.read();
            let state = guard.as_ref().ok_or_else(not_loaded)?;
            serde_json::to_vec(&IndexRecordRef {
                version: RECORD_VERSION,
                documents: &state.documents,
                chunks: &state.chunks,
            })?
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.persist(path).map_err(|e| e.error)?;

        tracing::info!(bytes = bytes.len(), "saved index to {}", path.display());
        Ok(())
    }

    /// Replace the in-memory index with the one saved at `path`.
    ///
    /// The file is decoded and validated before the write lock is taken, so a
    /// failed load leaves the current index untouched. The ID allocator
    /// resumes after the largest restored ID.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::NotFound`] if `path` does not exist,
    /// [`CodeseekError::Format`] if the content is not a valid index, or
    /// [`CodeseekError::Io`] for other read failures.
    pub fn load(&self, path: &Path) -> Result<(), CodeseekError> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CodeseekError::NotFound(format!(
                    "no saved index at {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let record: IndexRecord = serde_json::from_slice(&bytes)
            .map_err(|e| CodeseekError::Format(format!("{}: {e}", path.display())))?;
        let state = IndexState::from_record(record)?;

        tracing::info!(
            documents = state.documents.len(),
            chunks = state.chunks.len(),
            "loaded index from {}",
            path.display()
        );

        *self.write() = Some(state);
        Ok(())
    }

    /// Get index statistics.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::NotFound`] if no index is present.
    pub fn stats(&self) -> Result<IndexStats, CodeseekError> {
        let guard = self.read();
        let state = guard.as_ref().ok_or_else(not_loaded)?;

        Ok(IndexStats {
            total_documents: state.documents.len(),
            total_chunks: state.chunks.len(),
            dimensions: state.chunks.values().map(|c| c.vector.len()).collect(),
        })
    }

    /// Look up a document by ID.
    pub fn document(&self, id: u64) -> Option<Document> {
        self.read().as_ref()?.documents.get(&id).cloned()
    }

    /// Look up a chunk by ID.
    pub fn chunk(&self, id: u64) -> Option<Chunk> {
        self.read().as_ref()?.chunks.get(&id).cloned()
    }

    /// All documents, in ID order.
    pub fn documents(&self) -> Vec<Document> {
        self.read()
            .as_ref()
            .map(|s| s.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The ID the next insert will allocate, if an index is present.
    pub fn next_id(&self) -> Option<u64> {
        self.read().as_ref().map(|s| s.ids.peek())
    }

    // Every mutation leaves the maps consistent, so a poisoned lock is safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, Option<IndexState>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<IndexState>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_loaded() -> CodeseekError {
    CodeseekError::NotFound("no index loaded or ingested".into())
}
