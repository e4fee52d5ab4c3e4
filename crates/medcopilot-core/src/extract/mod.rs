//! Turning raw documents into labelled text units.
//!
//! `DocumentExtractor` dispatches on the document's kind tag. Failures are
//! reported per document (outer `Err`) or per unit (inner `Err`) and never
//! abort a batch; the caller aggregates them.

pub mod pdf;
pub mod pubmed;
pub mod text;
pub mod trials;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExtractionError;
use crate::traits::{TextUnitExtractor, UnitResult};
use crate::types::{DocumentKind, SourceDocument};

/// Pages read from a single PDF before the rest is ignored.
pub const DEFAULT_MAX_PDF_PAGES: usize = 201;

#[derive(Debug, Clone)]
pub struct DocumentExtractor {
    max_pdf_pages: usize,
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self { max_pdf_pages: DEFAULT_MAX_PDF_PAGES }
    }
}

impl DocumentExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pdf_pages(mut self, max_pdf_pages: usize) -> Self {
        self.max_pdf_pages = max_pdf_pages;
        self
    }
}

impl TextUnitExtractor for DocumentExtractor {
    fn extract(&self, document: &SourceDocument) -> Result<Vec<UnitResult>, ExtractionError> {
        match document.kind {
            DocumentKind::Pdf => pdf::extract_pages(&document.name, &document.bytes, self.max_pdf_pages),
            DocumentKind::PlainText => Ok(text::extract_pages(&document.name, &document.bytes)),
            DocumentKind::PubMedXml => pubmed::extract_articles(&document.name, &document.bytes),
            DocumentKind::TrialsJson => trials::extract_studies(&document.name, &document.bytes),
        }
    }
}

/// Provenance label for a paged document, 1-based.
pub fn page_label(name: &str, page_number: usize) -> String {
    format!("{} — Page {}", name, page_number)
}

/// Files under `root` whose extension maps to one of `kinds`, sorted by path.
pub fn collect_document_paths(root: &Path, kinds: &[DocumentKind]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| DocumentKind::from_path(p).is_some_and(|k| kinds.contains(&k)))
        .collect();
    paths.sort();
    paths
}

/// Read documents from disk. Unreadable or unrecognised files are returned by
/// name in the second list instead of failing the batch.
pub fn load_documents(paths: &[PathBuf]) -> (Vec<SourceDocument>, Vec<String>) {
    let mut documents = Vec::with_capacity(paths.len());
    let mut failed = Vec::new();
    for path in paths {
        let name = display_name(path);
        let Some(kind) = DocumentKind::from_path(path) else {
            tracing::warn!("{}", ExtractionError::UnsupportedKind { name: name.clone() });
            failed.push(name);
            continue;
        };
        match fs::read(path) {
            Ok(bytes) => documents.push(SourceDocument::new(name, kind, bytes)),
            Err(e) => {
                tracing::warn!("{}", ExtractionError::unreadable(&name, e));
                failed.push(name);
            }
        }
    }
    (documents, failed)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn collects_only_requested_kinds_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("nested")).unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("nested/a.txt"), "a").unwrap();
        fs::write(tmp.path().join("c.xml"), "<x/>").unwrap();
        fs::write(tmp.path().join("notes.md"), "ignored").unwrap();

        let paths = collect_document_paths(tmp.path(), &[DocumentKind::PlainText]);
        let names: Vec<String> = paths.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
    }

    #[test]
    fn missing_files_are_reported_by_name() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.txt");
        fs::write(&good, "hello").unwrap();
        let missing = tmp.path().join("missing.txt");

        let (docs, failed) = load_documents(&[good, missing]);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "good.txt");
        assert_eq!(docs[0].kind, DocumentKind::PlainText);
        assert_eq!(failed, vec!["missing.txt".to_string()]);
    }

    #[test]
    fn dispatches_on_kind() {
        let extractor = DocumentExtractor::new();
        let doc = SourceDocument::new("memo.txt", DocumentKind::PlainText, "page one\x0Cpage two");
        let units: Vec<_> = extractor.extract(&doc).unwrap().into_iter().map(|u| u.unwrap()).collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].source, "memo.txt — Page 2");
    }
}
