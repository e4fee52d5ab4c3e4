//! Domain types shared by extraction, indexing and retrieval.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Kind tag that selects how a document's bytes are turned into text units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    #[serde(rename = "pubmed_xml")]
    PubMedXml,
    TrialsJson,
    PlainText,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [Self::Pdf, Self::PubMedXml, Self::TrialsJson, Self::PlainText];

    /// Infer the kind from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "xml" => Some(Self::PubMedXml),
            "json" => Some(Self::TrialsJson),
            "txt" => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PubMedXml => "xml",
            Self::TrialsJson => "json",
            Self::PlainText => "txt",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pdf => "pdf",
            Self::PubMedXml => "pubmed_xml",
            Self::TrialsJson => "trials_json",
            Self::PlainText => "plain_text",
        };
        f.write_str(name)
    }
}

/// A raw input document: display name, kind tag and the bytes to extract from.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, kind: DocumentKind, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), kind, bytes: bytes.into() }
    }
}

/// One retrievable chunk of text and where it came from.
///
/// `source` is a human-readable provenance label such as
/// `"guideline.pdf — Page 3"`, `"PMID: 123"` or `"NCT ID: NCT0001"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextUnit {
    pub text: String,
    pub source: String,
}

impl TextUnit {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self { text: text.into(), source: source.into() }
    }

    /// Character count of the trimmed text, the measure used by length filtering.
    pub fn trimmed_len(&self) -> usize {
        self.text.trim().chars().count()
    }
}

/// A ranked retrieval hit. `distance` is squared L2; lower is closer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub row: usize,
    pub text: String,
    pub source: String,
    pub distance: f32,
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildResult {
    /// Units embedded and written to the snapshot.
    pub unit_count: usize,
    /// Names of documents that failed extraction (or could not be read).
    pub failed_documents: Vec<String>,
    /// Units discarded for being shorter than the minimum length.
    pub short_units: usize,
    /// Individual units whose extraction failed inside otherwise usable documents.
    pub unit_errors: usize,
}

/// What the answer-synthesis collaborator returns. Always renderable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesizedAnswer {
    pub answer: String,
    /// Model that produced the answer; `None` for diagnostic fallbacks.
    pub model: Option<String>,
}

impl SynthesizedAnswer {
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self { answer: message.into(), model: None }
    }

    pub fn is_diagnostic(&self) -> bool {
        self.model.is_none()
    }
}
