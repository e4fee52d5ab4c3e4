use std::sync::Arc;

use medcopilot_core::config::{EmbeddingBackend, EmbeddingSettings};
use medcopilot_core::{Embedder, Error};
use medcopilot_embed::{build_embedder, reset_shared_embedder, shared_embedder, HashEmbedder};

fn hash_settings(dim: usize) -> EmbeddingSettings {
    EmbeddingSettings { backend: EmbeddingBackend::Hash, hash_dim: dim, ..EmbeddingSettings::default() }
}

#[test]
fn hash_embedder_shapes_and_determinism() {
    let embedder = build_embedder(&hash_settings(384)).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");

    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 384, "embedding dim follows hash_dim");

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    assert_eq!(embs[0], embs[1], "same text, same vector");
}

#[test]
fn zero_hash_dim_is_invalid_config() {
    let err = build_embedder(&hash_settings(0)).err().expect("zero dimension is rejected");
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn batch_composition_does_not_change_vectors() {
    let embedder = HashEmbedder::new(128);
    let alone = embedder.embed_one("sepsis fluid resuscitation").unwrap();
    let batch = embedder
        .embed_batch(&["unrelated text".to_string(), "sepsis fluid resuscitation".to_string()])
        .unwrap();
    assert_eq!(alone, batch[1]);
}

#[test]
fn shared_embedder_is_created_once_until_reset() {
    reset_shared_embedder();
    let first = shared_embedder(&hash_settings(32)).unwrap();
    let second = shared_embedder(&hash_settings(64)).unwrap();
    assert!(Arc::ptr_eq(&first, &second), "second call reuses the first handle");
    assert_eq!(second.dim(), 32);

    reset_shared_embedder();
    let third = shared_embedder(&hash_settings(64)).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.dim(), 64);
    reset_shared_embedder();
}
