pub mod config;
pub mod error;
pub mod extract;
pub mod traits;
pub mod types;

pub use error::{Error, ExtractionError, Result};
pub use traits::{AnswerSynthesizer, Embedder, TextUnitExtractor, UnitResult};
pub use types::{BuildResult, DocumentKind, SearchResult, SourceDocument, SynthesizedAnswer, TextUnit};
