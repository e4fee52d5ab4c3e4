use crate::error::{ExtractionError, Result};
use crate::types::{SourceDocument, SynthesizedAnswer, TextUnit};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for a fixed model: the same text
/// always yields the same vector, whatever batch it is embedded in.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model/provider (e.g. `minilm:all-MiniLM-L6-v2:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// One vector per input text, same order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        out.pop().ok_or_else(|| crate::Error::Embedding("embedder returned no vector".into()))
    }
}

/// Per-unit extraction outcome.
pub type UnitResult = std::result::Result<TextUnit, ExtractionError>;

/// Turns a raw document into ordered text units with provenance labels.
///
/// The outer error means the whole document is unusable; inner errors mark
/// individual units that could not be produced.
pub trait TextUnitExtractor: Send + Sync {
    fn extract(&self, document: &SourceDocument) -> std::result::Result<Vec<UnitResult>, ExtractionError>;
}

/// Free-form answer synthesis. Never fails: problems come back as a
/// diagnostic answer so callers can always render something.
pub trait AnswerSynthesizer: Send + Sync {
    fn answer(&self, prompt: &str) -> SynthesizedAnswer;
}
