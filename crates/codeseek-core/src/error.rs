/// Errors that can occur while building, persisting, or querying an index.
///
/// Library crates use this type directly; the binary converts to a
/// `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use codeseek_core::CodeseekError;
///
/// let err = CodeseekError::Format("unexpected version 7".into());
/// assert!(err.to_string().contains("unexpected version 7"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CodeseekError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The embedding service failed (transport, status, or malformed body).
    #[error("embedding error: {0}")]
    Embedding(String),

    /// No index exists yet, or the persisted index file is missing.
    #[error("index not found: {0}")]
    #[diagnostic(help("run `codeseek index` to build the index first"))]
    NotFound(String),

    /// The persisted index does not match the expected record shape.
    #[error("index format error: {0}")]
    #[diagnostic(help("delete the index file and run `codeseek index` to rebuild it"))]
    Format(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CodeseekError = io_err.into();
        assert!(matches!(err, CodeseekError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn not_found_has_guidance() {
        use miette::Diagnostic;

        let err = CodeseekError::NotFound("no index at .codeseek/index.json".into());
        assert!(err.to_string().contains(".codeseek/index.json"));
        let help = err.help().map(|h| h.to_string()).unwrap_or_default();
        assert!(help.contains("codeseek index"));
    }

    #[test]
    fn embedding_error_displays_message() {
        let err = CodeseekError::Embedding("status 503".into());
        assert_eq!(err.to_string(), "embedding error: status 503");
    }

    #[test]
    fn json_error_converts() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CodeseekError = json_err.into();
        assert!(matches!(err, CodeseekError::Serialization(_)));
    }
}
