use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

use medcopilot_core::{Embedder, Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_padded;

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    pad_id: u32,
}

/// Sentence embedder for all-MiniLM-L6-v2 style BERT checkpoints.
///
/// The model directory must hold `config.json`, `tokenizer.json` and either
/// `model.safetensors` or `pytorch_model.bin`. Only `config.json` is read up
/// front; weights are loaded on the first `embed_batch` and kept afterwards.
pub struct MiniLmEmbedder {
    id: String,
    model_dir: PathBuf,
    config: BertConfig,
    dim: usize,
    max_len: usize,
    device: Device,
    loaded: Mutex<Option<Arc<LoadedModel>>>,
}

fn unavailable(msg: impl std::fmt::Display) -> Error {
    Error::ModelUnavailable(msg.to_string())
}

impl MiniLmEmbedder {
    pub fn new(model_dir: &Path, max_len: usize) -> Result<Self> {
        let config_path = model_dir.join("config.json");
        let raw = fs::read_to_string(&config_path)
            .map_err(|e| unavailable(format!("cannot read {}: {}", config_path.display(), e)))?;
        let config: BertConfig = serde_json::from_str(&raw)
            .map_err(|e| unavailable(format!("invalid {}: {}", config_path.display(), e)))?;
        let dim = serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.get("hidden_size").and_then(|h| h.as_u64()))
            .ok_or_else(|| unavailable(format!("{} has no hidden_size", config_path.display())))? as usize;

        let model_name = model_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "minilm".to_string());
        Ok(Self {
            id: format!("minilm:{}:d{}", model_name, dim),
            model_dir: model_dir.to_path_buf(),
            config,
            dim,
            max_len,
            device: select_device(),
            loaded: Mutex::new(None),
        })
    }

    fn model(&self) -> Result<Arc<LoadedModel>> {
        let mut slot = self.loaded.lock().map_err(|_| unavailable("model lock poisoned"))?;
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(self.load()?);
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    fn load(&self) -> Result<LoadedModel> {
        let started = Instant::now();
        tracing::info!("Loading embedding model from {}", self.model_dir.display());

        let tokenizer_path = self.model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| unavailable(format!("failed to load tokenizer from {}: {}", tokenizer_path.display(), e)))?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let weights = self.read_weights()?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &self.device);
        let model = BertModel::load(vb, &self.config).map_err(|e| unavailable(format!("failed to build model: {}", e)))?;

        tracing::info!("Embedding model ready in {:.2?}", started.elapsed());
        Ok(LoadedModel { model, tokenizer, pad_id })
    }

    fn read_weights(&self) -> Result<HashMap<String, Tensor>> {
        let safetensors = self.model_dir.join("model.safetensors");
        if safetensors.exists() {
            return candle_core::safetensors::load(&safetensors, &self.device)
                .map_err(|e| unavailable(format!("failed to read {}: {}", safetensors.display(), e)));
        }
        let pickle = self.model_dir.join("pytorch_model.bin");
        let tensors = candle_core::pickle::read_all(&pickle)
            .map_err(|e| unavailable(format!("failed to read {}: {}", pickle.display(), e)))?;
        Ok(tensors.into_iter().collect())
    }

    fn embed_text(&self, loaded: &LoadedModel, text: &str) -> anyhow::Result<Vec<f32>> {
        let enc = tokenize_padded(&loaded.tokenizer, text, self.max_len, loaded.pad_id, &self.device)?;
        let hidden = loaded.model.forward(&enc.input_ids, &enc.token_type_ids, Some(&enc.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &enc.attention_mask)?;
        let vector = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        Ok(vector)
    }
}

impl Embedder for MiniLmEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let loaded = self.model()?;
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let vector = self.embed_text(&loaded, text).map_err(|e| Error::Embedding(e.to_string()))?;
            if vector.len() != self.dim {
                return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
            }
            out.push(vector);
        }
        tracing::debug!("Embedded {} text(s)", out.len());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_model_dir_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let err = MiniLmEmbedder::new(&tmp.path().join("nope"), 256).err().unwrap();
        assert!(matches!(err, Error::ModelUnavailable(_)));
    }
}
