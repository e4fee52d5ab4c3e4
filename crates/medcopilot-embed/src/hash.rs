use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use medcopilot_core::{Embedder, Result};

/// Deterministic bag-of-tokens embedder.
///
/// Each lowercased alphanumeric token is hashed into one of `dim` buckets and
/// the result is L2-normalized. Texts sharing words land close together, which
/// is enough for tests and offline runs without model weights.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { id: format!("hash:xxh64:d{}", dim), dim }
    }

    /// A zero-dimension embedder yields empty vectors.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        if self.dim == 0 {
            return Vec::new();
        }
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_and_punctuation_do_not_matter() {
        let e = HashEmbedder::new(64);
        assert_eq!(e.embed_text("Diabetes, management!"), e.embed_text("diabetes management"));
    }

    #[test]
    fn zero_dimension_does_not_panic() {
        assert!(HashEmbedder::new(0).embed_text("sepsis").is_empty());
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashEmbedder::new(8);
        assert!(e.embed_text("   ").iter().all(|x| *x == 0.0));
    }
}
