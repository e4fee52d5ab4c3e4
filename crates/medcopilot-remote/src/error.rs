use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid XML: {0}")]
    Xml(String),

    #[error("Response had no answer text")]
    EmptyResponse,
}

pub type Result<T> = std::result::Result<T, RemoteError>;
