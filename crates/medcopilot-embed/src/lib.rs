//! Text embedders and the process-wide shared handle.
//!
//! `shared_embedder` builds the configured embedder once per process; callers
//! pass the returned handle to the components that need it.

pub mod device;
pub mod hash;
pub mod minilm;
pub mod pool;
pub mod tokenize;

use std::sync::{Arc, Mutex, OnceLock};

use medcopilot_core::config::{EmbeddingBackend, EmbeddingSettings};
use medcopilot_core::{Embedder, Error, Result};

pub use hash::HashEmbedder;
pub use minilm::MiniLmEmbedder;
pub use pool::masked_mean_l2;

static SHARED: OnceLock<Mutex<Option<Arc<dyn Embedder>>>> = OnceLock::new();

fn shared_slot() -> &'static Mutex<Option<Arc<dyn Embedder>>> {
    SHARED.get_or_init(|| Mutex::new(None))
}

/// True when `APP_USE_FAKE_EMBEDDINGS` is `1` or `true`.
pub fn fake_embeddings_requested() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Construct a fresh embedder for `settings`, bypassing the shared handle.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if fake_embeddings_requested() || settings.backend == EmbeddingBackend::Hash {
        if settings.hash_dim == 0 {
            return Err(Error::InvalidConfig("embedding.hash_dim must be > 0".into()));
        }
        tracing::info!("Using hash embedder (dim {})", settings.hash_dim);
        return Ok(Arc::new(HashEmbedder::new(settings.hash_dim)));
    }
    Ok(Arc::new(MiniLmEmbedder::new(&settings.model_dir, settings.max_len)?))
}

/// The process-wide embedder, created on first call and reused afterwards.
/// Later calls ignore `settings` until `reset_shared_embedder` is called.
pub fn shared_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let mut slot = shared_slot()
        .lock()
        .map_err(|_| Error::ModelUnavailable("shared embedder lock poisoned".into()))?;
    if let Some(embedder) = slot.as_ref() {
        return Ok(Arc::clone(embedder));
    }
    let embedder = build_embedder(settings)?;
    tracing::debug!("Shared embedder initialized: {}", embedder.embedder_id());
    *slot = Some(Arc::clone(&embedder));
    Ok(embedder)
}

/// Drop the shared embedder so the next `shared_embedder` call rebuilds it.
pub fn reset_shared_embedder() {
    if let Ok(mut slot) = shared_slot().lock() {
        *slot = None;
        tracing::info!("Shared embedder cleared");
    }
}
