//! HTTP collaborators: answer synthesis and corpus downloads.

pub mod error;
pub mod groq;
pub mod pubmed;
pub mod trials;

use std::time::Duration;

use reqwest::blocking::Client;

pub use error::{RemoteError, Result};
pub use groq::GroqSynthesizer;
pub use pubmed::fetch_pubmed;
pub use trials::fetch_trials;

/// Blocking client for the download endpoints.
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .user_agent(concat!("medcopilot/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// `<prefix>_<topic>_<YYYYMMDD>.<ext>` with whitespace in the topic turned into
/// underscores and path-unsafe characters dropped.
pub fn dated_file_name(prefix: &str, topic: &str, ext: &str) -> String {
    let topic: String = topic
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();
    format!("{}_{}_{}.{}", prefix, topic, chrono::Local::now().format("%Y%m%d"), ext)
}
