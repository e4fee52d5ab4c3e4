use std::path::PathBuf;

use thiserror::Error;

/// Failures of the retrieval core.
///
/// Recoverable conditions (`EmptyIndex`, `IndexNotReady`, `NoDocumentsIndexed`,
/// `EmptyQuery`, `InvalidTopK`) mean the caller should build first or fix the
/// request. `RowOutOfRange` and `SnapshotCorrupt` are invariant violations and
/// indicate a bug in the build or save path, not a user error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index is empty")]
    EmptyIndex,

    #[error("No index is loaded; build the corpus first")]
    IndexNotReady,

    #[error("Row {row} out of range (len {len})")]
    RowOutOfRange { row: usize, len: usize },

    #[error("No snapshot at {}", .0.display())]
    SnapshotNotFound(PathBuf),

    #[error("Corrupt snapshot at {}: {reason}", path.display())]
    SnapshotCorrupt { path: PathBuf, reason: String },

    #[error("No text units could be indexed ({} document(s) failed)", failed_documents.len())]
    NoDocumentsIndexed { failed_documents: Vec<String> },

    #[error("Query is empty")]
    EmptyQuery,

    #[error("k must be a positive integer")]
    InvalidTopK,

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Why a document (or a single unit inside it) could not be turned into text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("{name}: unreadable: {reason}")]
    Unreadable { name: String, reason: String },

    #[error("{name}: unsupported document kind")]
    UnsupportedKind { name: String },

    #[error("{name}: malformed content: {reason}")]
    Malformed { name: String, reason: String },

    #[error("{name}: record {index} is missing {field}")]
    MissingField { name: String, index: usize, field: &'static str },
}

impl ExtractionError {
    pub fn unreadable(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreadable { name: name.into(), reason: reason.to_string() }
    }

    pub fn malformed(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed { name: name.into(), reason: reason.to_string() }
    }
}
