//! Workspace ingestion: walk, chunk, embed, insert.
//!
//! Files are processed one at a time and chunks are embedded sequentially, so
//! at most one embedding request is in flight. Vectors for a whole file are
//! computed before the store's write lock is taken for the insert.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use codeseek_core::{CodeseekConfig, CodeseekError, EmbeddingConfig};
use tokio_util::sync::CancellationToken;

use crate::chunker::Chunker;
use crate::embedding::Embedder;
use crate::store::{DocumentSummary, IndexStore};
use crate::walker::list_files;

/// Retry schedule for failed embedding calls.
///
/// Only [`CodeseekError::Embedding`] failures are retried. The delay starts
/// at `initial_backoff` and doubles after every attempt.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use codeseek_index::ingest::RetryPolicy;
///
/// let retry = RetryPolicy { max_retries: 3, initial_backoff: Duration::from_millis(100) };
/// assert_eq!(retry.backoff(0), Duration::from_millis(100));
/// assert_eq!(retry.backoff(2), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first failure; zero disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Fail on the first error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Build from the `[embedding]` config section.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

/// How an ingestion run behaves.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Line-window policy.
    pub chunker: Chunker,
    /// Abort on the first failing file instead of recording it and moving on.
    pub fail_fast: bool,
    /// Retry schedule around each embedding call.
    pub retry: RetryPolicy,
    /// Glob patterns excluded from the walk.
    pub exclude: Vec<String>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunker: Chunker::default(),
            fail_fast: true,
            retry: RetryPolicy::none(),
            exclude: Vec::new(),
        }
    }
}

impl IngestOptions {
    /// Build options from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Config`] if the window/overlap pair is invalid.
    pub fn from_config(config: &CodeseekConfig) -> Result<Self, CodeseekError> {
        Ok(Self {
            chunker: Chunker::new(config.index.window, config.index.overlap)?,
            fail_fast: config.index.fail_fast,
            retry: RetryPolicy::from_config(&config.embedding),
            exclude: config.workspace.exclude.clone(),
        })
    }
}

/// What happened to one file during ingestion.
#[derive(Debug)]
pub enum FileOutcome {
    /// The file was chunked, embedded, and stored.
    Indexed(DocumentSummary),
    /// The file had no non-blank content; nothing was stored.
    Skipped(PathBuf),
    /// The file failed and the run continued.
    Failed {
        /// Path as walked.
        path: PathBuf,
        /// Why it failed.
        error: CodeseekError,
    },
}

/// Per-file results of an ingestion run, in discovery order.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use codeseek_index::ingest::{FileOutcome, IngestReport};
/// use codeseek_index::store::DocumentSummary;
///
/// let report = IngestReport {
///     files: vec![
///         FileOutcome::Indexed(DocumentSummary { document_id: 1, path: PathBuf::from("a.go"), chunks: 3 }),
///         FileOutcome::Skipped(PathBuf::from("empty.go")),
///     ],
/// };
/// assert_eq!(report.total_chunks(), 3);
/// assert!(report.is_complete());
/// ```
#[derive(Debug, Default)]
pub struct IngestReport {
    /// One entry per discovered file.
    pub files: Vec<FileOutcome>,
}

impl IngestReport {
    /// Files that were stored.
    pub fn indexed(&self) -> impl Iterator<Item = &DocumentSummary> {
        self.files.iter().filter_map(|f| match f {
            FileOutcome::Indexed(summary) => Some(summary),
            _ => None,
        })
    }

    /// Files that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&Path, &CodeseekError)> {
        self.files.iter().filter_map(|f| match f {
            FileOutcome::Failed { path, error } => Some((path.as_path(), error)),
            _ => None,
        })
    }

    /// Number of files skipped for having no content.
    pub fn skipped(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f, FileOutcome::Skipped(_)))
            .count()
    }

    /// Chunks stored across all indexed files.
    pub fn total_chunks(&self) -> usize {
        self.indexed().map(|s| s.chunks).sum()
    }

    /// `true` if no file failed.
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl IndexStore {
    /// Ingest every file under `root` whose extension is in `extensions`.
    ///
    /// Documents keep the path as walked, so they include `root` (minus any
    /// `./` segments) and files ingested from different roots stay distinct.
    ///
    /// Files are handled in discovery order. Each file is read and chunked,
    /// every non-blank chunk is embedded, and only then is the document
    /// inserted, so a file is either stored whole or not at all. Empty files
    /// are skipped without allocating an ID.
    ///
    /// With `options.fail_fast` the first read or embedding error aborts the
    /// run; files stored before it stay in memory and nothing is saved.
    /// Otherwise the error is recorded in the report and the next file is
    /// processed. Cancelling `cancel` aborts the run in either mode.
    ///
    /// # Errors
    ///
    /// Returns [`CodeseekError::Io`] if the walk fails or (fail-fast) a file
    /// cannot be read, [`CodeseekError::Embedding`] (fail-fast) if an
    /// embedding call fails after retries, or [`CodeseekError::Cancelled`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use codeseek_index::embedding::OllamaEmbedder;
    /// use codeseek_index::ingest::IngestOptions;
    /// use codeseek_index::store::IndexStore;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example() {
    /// let store = IndexStore::new();
    /// let embedder = OllamaEmbedder::new("http://localhost:11434", "nomic-embed-text").unwrap();
    /// let report = store
    ///     .ingest(
    ///         Path::new("."),
    ///         &[".go".to_string()],
    ///         &embedder,
    ///         &IngestOptions::default(),
    ///         &CancellationToken::new(),
    ///     )
    ///     .await
    ///     .unwrap();
    /// println!("stored {} chunks", report.total_chunks());
    /// store.save(Path::new(".codeseek/index.json")).unwrap();
    /// # }
    /// ```
    pub async fn ingest<E: Embedder>(
        &self,
        root: &Path,
        extensions: &[String],
        embedder: &E,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestReport, CodeseekError> {
        let files = list_files(root, extensions, &options.exclude)?;
        self.ensure_loaded();

        tracing::info!(files = files.len(), "ingesting {}", root.display());

        let mut report = IngestReport::default();
        for file in files {
            if cancel.is_cancelled() {
                return Err(CodeseekError::Cancelled);
            }

            let path = walked_path(&file);

            match self
                .ingest_file(&file, path.clone(), embedder, options, cancel)
                .await
            {
                Ok(Some(summary)) => report.files.push(FileOutcome::Indexed(summary)),
                Ok(None) => {
                    tracing::debug!("skipping empty file {}", path.display());
                    report.files.push(FileOutcome::Skipped(path));
                }
                Err(CodeseekError::Cancelled) => return Err(CodeseekError::Cancelled),
                Err(e) if options.fail_fast => return Err(e),
                Err(e) => {
                    tracing::warn!("failed to ingest {}: {e}", path.display());
                    report.files.push(FileOutcome::Failed { path, error: e });
                }
            }
        }

        tracing::info!(
            indexed = report.indexed().count(),
            skipped = report.skipped(),
            failed = report.failures().count(),
            chunks = report.total_chunks(),
            "ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_file<E: Embedder>(
        &self,
        file: &Path,
        path: PathBuf,
        embedder: &E,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<Option<DocumentSummary>, CodeseekError> {
        let content = tokio::fs::read_to_string(file).await.map_err(|e| {
            CodeseekError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read {}: {e}", path.display()),
            ))
        })?;

        let spans = options.chunker.split(&content);
        if spans.is_empty() {
            return Ok(None);
        }

        let mut embedded = Vec::with_capacity(spans.len());
        for span in spans {
            let vector = embed_with_retry(embedder, &span.text, &options.retry, cancel)
                .await
                .map_err(|e| match e {
                    CodeseekError::Embedding(msg) => CodeseekError::Embedding(format!(
                        "{}:{}-{}: {msg}",
                        path.display(),
                        span.start_line,
                        span.end_line
                    )),
                    other => other,
                })?;
            embedded.push((span, vector));
        }

        self.insert_document(path, content, embedded).map(Some)
    }
}

/// The walked path with `.` segments dropped: `./src/a.go` becomes `src/a.go`.
fn walked_path(file: &Path) -> PathBuf {
    let path: PathBuf = file
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if path.as_os_str().is_empty() {
        file.to_path_buf()
    } else {
        path
    }
}

/// Embed `text`, retrying embedding failures per `retry`.
///
/// The call and every backoff sleep are raced against `cancel`.
///
/// # Errors
///
/// Returns [`CodeseekError::Cancelled`] if `cancel` fires, otherwise the
/// last error from the embedder.
pub async fn embed_with_retry<E: Embedder>(
    embedder: &E,
    text: &str,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<f32>, CodeseekError> {
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CodeseekError::Cancelled),
            result = embedder.embed(text) => result,
        };

        match result {
            Ok(vector) => return Ok(vector),
            Err(e @ CodeseekError::Embedding(_)) if attempt < retry.max_retries => {
                let delay = retry.backoff(attempt);
                attempt += 1;
                tracing::warn!(attempt, "embedding failed, retrying in {delay:?}: {e}");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(CodeseekError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then returns a fixed vector.
    struct FlakyEmbedder {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyEmbedder {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, CodeseekError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(CodeseekError::Embedding(format!("transient failure {n}")))
            } else {
                Ok(vec![1.0, 0.0])
            }
        }
    }

    fn quick_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let retry = quick_retry(5);
        assert_eq!(retry.backoff(0), Duration::from_millis(1));
        assert_eq!(retry.backoff(3), Duration::from_millis(8));
        assert!(retry.backoff(64) >= Duration::from_millis(1));
    }

    #[test]
    fn options_follow_config() {
        let mut config = CodeseekConfig::default();
        config.index.window = 20;
        config.index.overlap = 2;
        config.index.fail_fast = false;
        config.embedding.max_retries = 4;
        config.embedding.retry_backoff_ms = 50;

        let options = IngestOptions::from_config(&config).unwrap();
        assert_eq!(options.chunker.window(), 20);
        assert_eq!(options.chunker.overlap(), 2);
        assert!(!options.fail_fast);
        assert_eq!(options.retry.max_retries, 4);
        assert_eq!(options.retry.initial_backoff, Duration::from_millis(50));
        assert_eq!(options.exclude, config.workspace.exclude);
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let embedder = FlakyEmbedder::new(2);
        let vector = embed_with_retry(&embedder, "x", &quick_retry(2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(vector, vec![1.0, 0.0]);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let embedder = FlakyEmbedder::new(5);
        let result =
            embed_with_retry(&embedder, "x", &quick_retry(1), &CancellationToken::new()).await;
        assert!(matches!(result, Err(CodeseekError::Embedding(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn no_retry_by_default() {
        let embedder = FlakyEmbedder::new(1);
        let result =
            embed_with_retry(&embedder, "x", &RetryPolicy::none(), &CancellationToken::new()).await;
        assert!(result.is_err());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_calling() {
        let embedder = FlakyEmbedder::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = embed_with_retry(&embedder, "x", &quick_retry(3), &cancel).await;
        assert!(matches!(result, Err(CodeseekError::Cancelled)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn walked_path_keeps_root_and_drops_dot_segments() {
        assert_eq!(walked_path(Path::new("./src/a.go")), PathBuf::from("src/a.go"));
        assert_eq!(walked_path(Path::new("src/./a.go")), PathBuf::from("src/a.go"));
        assert_eq!(walked_path(Path::new("cmd/main.go")), PathBuf::from("cmd/main.go"));
        assert_eq!(walked_path(Path::new("/repo/a.go")), PathBuf::from("/repo/a.go"));
    }

    #[test]
    fn report_counts_outcomes() {
        let report = IngestReport {
            files: vec![
                FileOutcome::Indexed(DocumentSummary {
                    document_id: 1,
                    path: PathBuf::from("a.go"),
                    chunks: 2,
                }),
                FileOutcome::Skipped(PathBuf::from("b.go")),
                FileOutcome::Failed {
                    path: PathBuf::from("c.go"),
                    error: CodeseekError::Embedding("down".into()),
                },
                FileOutcome::Indexed(DocumentSummary {
                    document_id: 4,
                    path: PathBuf::from("d.go"),
                    chunks: 1,
                }),
            ],
        };
        assert_eq!(report.indexed().count(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.total_chunks(), 3);
        assert!(!report.is_complete());
        let (path, _) = report.failures().next().unwrap();
        assert_eq!(path, Path::new("c.go"));
    }
}
