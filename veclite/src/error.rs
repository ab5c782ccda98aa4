//! Error types for veclite.

use thiserror::Error;

/// Hint attached to a [`Error::ConsistencyError`] describing how to repair it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationHint {
    /// Run `VectorFile::compact` to rewrite a vector file densely.
    Compact,
    /// Run the batch coordinator's intent-log reconciliation on next open.
    Reconcile,
}

impl std::fmt::Display for RemediationHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemediationHint::Compact => write!(f, "run compact()"),
            RemediationHint::Reconcile => write!(f, "reopen to trigger reconciliation"),
        }
    }
}

/// veclite's error taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown table/column, invalid view, dimension mismatch.
    #[error("schema error: {0}")]
    SchemaError(String),

    /// Filter value incompatible with the column's declared type.
    #[error("filter type error: {0}")]
    FilterTypeError(String),

    /// Malformed regex pattern passed to `Filter::regex`.
    #[error("invalid pattern: {0}")]
    BadPattern(String),

    /// The `Embedder` capability failed. Always retryable.
    #[error("embedder error: {0}")]
    EmbedderError(String),

    /// RelStore or VectorFile I/O failed.
    #[error("storage error: {0}")]
    StorageError(String),

    /// A vector file's on-disk invariants were violated at open time:
    /// mismatched slot counts between the vector and id files, or a
    /// vector whose length doesn't match the column's declared dimension.
    #[error("consistency error: {message} ({hint})")]
    ConsistencyError {
        message: String,
        hint: RemediationHint,
    },

    /// Operation abandoned at a suspension point.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type alias for veclite operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same operation might succeed.
    ///
    /// `EmbedderError` is always retryable; `StorageError` is
    /// retryable only for causes that are typically transient (a busy
    /// SQLite connection). Everything else is a caller bug or permanent
    /// state and is not retryable.
    pub fn retryable(&self) -> bool {
        match self {
            Error::EmbedderError(_) => true,
            Error::StorageError(msg) => msg.contains("busy") || msg.contains("locked"),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::StorageError(err.to_string())
    }
}

/// Failure kinds for [`crate::view::ViewResolver`] registration.
///
/// Kept distinct from [`Error`] so callers can match on the specific
/// validation that failed; folded into `Error::SchemaError` at the
/// `Client` boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown field: {0}.{1}")]
    UnknownField(String, String),

    #[error("disconnected join: tables {0:?} are not reachable via declared foreign keys")]
    DisconnectedJoin(Vec<String>),

    #[error("view does not declare an id alias mapped to a vector-bearing table's primary key")]
    MissingVectorId,
}

impl From<ViewError> for Error {
    fn from(err: ViewError) -> Self {
        Error::SchemaError(err.to_string())
    }
}
