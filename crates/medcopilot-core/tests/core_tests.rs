use std::fs;

use tempfile::TempDir;

use medcopilot_core::config::Config;
use medcopilot_core::extract::{collect_document_paths, load_documents, DocumentExtractor};
use medcopilot_core::{DocumentKind, ExtractionError, TextUnitExtractor};

const PUBMED: &str = r#"<PubmedArticleSet>
  <PubmedArticle><MedlineCitation><PMID>123</PMID><Article>
    <ArticleTitle>Early goal-directed therapy</ArticleTitle>
    <Abstract><AbstractText>Fluids within six hours.</AbstractText></Abstract>
  </Article></MedlineCitation></PubmedArticle>
</PubmedArticleSet>"#;

const TRIALS: &str = r#"{"studies":[{"protocolSection":{
  "identificationModule":{"nctId":"NCT00000001","briefTitle":"Vitamin C in sepsis"},
  "conditionsModule":{"conditions":["Sepsis"]},
  "designModule":{"phases":["PHASE3"]},
  "statusModule":{"overallStatus":"COMPLETED"}}}]}"#;

#[test]
fn extracts_every_kind_from_a_directory() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("articles.xml"), PUBMED).unwrap();
    fs::write(dir.join("trials.json"), TRIALS).unwrap();
    fs::write(dir.join("notes.txt"), "page one\x0Cpage two").unwrap();

    let paths = collect_document_paths(dir, &DocumentKind::ALL);
    let (documents, failed) = load_documents(&paths);
    assert!(failed.is_empty());
    assert_eq!(documents.len(), 3);

    let extractor = DocumentExtractor::new();
    let mut sources = Vec::new();
    for doc in &documents {
        for unit in extractor.extract(doc).expect("extract") {
            sources.push(unit.expect("unit").source);
        }
    }
    assert_eq!(
        sources,
        vec!["PMID: 123", "notes.txt — Page 1", "notes.txt — Page 2", "NCT ID: NCT00000001"]
    );
}

#[test]
fn malformed_document_is_a_document_error() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let (documents, _) = load_documents(&[path]);
    let err = DocumentExtractor::new().extract(&documents[0]).unwrap_err();
    assert!(matches!(err, ExtractionError::Malformed { ref name, .. } if name == "broken.json"));
}

#[test]
fn config_files_resolve_paths_against_their_directory() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("config.toml"),
        r#"
[corpora.hospital]
documents_dir = "library"
snapshot_path = "cache/hospital.snapshot"
min_unit_chars = 50
kinds = ["pdf", "plain_text"]
"#,
    )
    .unwrap();

    let config = Config::load_from(tmp.path(), Some("test")).expect("config");
    let settings = config.settings().unwrap();
    let hospital = settings.corpus("hospital").unwrap();
    assert_eq!(hospital.documents_dir, tmp.path().join("library"));
    assert_eq!(hospital.min_unit_chars, 50);
    assert_eq!(config.get::<usize>("corpora.hospital.min_unit_chars").unwrap(), 50);
}
