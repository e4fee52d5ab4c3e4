//! PubMed E-utilities download: esearch for ids, then efetch the article XML.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::blocking::Client;

use crate::error::{RemoteError, Result};
use crate::dated_file_name;

pub const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
pub const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

/// PubMed ids listed in an esearch XML response.
pub fn parse_search_ids(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut ids = Vec::new();
    let mut in_id = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Id" => in_id = true,
            Ok(Event::End(e)) if e.name().as_ref() == b"Id" => in_id = false,
            Ok(Event::Text(t)) if in_id => {
                let id = t.unescape().map_err(|e| RemoteError::Xml(e.to_string()))?;
                let id = id.trim();
                if !id.is_empty() {
                    ids.push(id.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(RemoteError::Xml(e.to_string())),
            _ => {}
        }
    }
    Ok(ids)
}

/// Search PubMed for `query` and save up to `max_results` articles under `dir`
/// as `pubmed_<query>_<YYYYMMDD>.xml`. Returns `None` when nothing matched.
pub fn fetch_pubmed(client: &Client, query: &str, max_results: usize, dir: &Path) -> Result<Option<PathBuf>> {
    tracing::info!("Searching PubMed for: {}", query);
    let retmax = max_results.to_string();
    let search = client
        .get(ESEARCH_URL)
        .query(&[("db", "pubmed"), ("term", query), ("retmax", retmax.as_str()), ("retmode", "xml")])
        .send()?
        .error_for_status()?
        .text()?;
    let ids = parse_search_ids(&search)?;
    tracing::info!("Found {} paper(s)", ids.len());
    if ids.is_empty() {
        return Ok(None);
    }

    let joined = ids.join(",");
    let articles = client
        .get(EFETCH_URL)
        .query(&[("db", "pubmed"), ("id", joined.as_str()), ("retmode", "xml")])
        .send()?
        .error_for_status()?
        .text()?;

    fs::create_dir_all(dir)?;
    let path = dir.join(dated_file_name("pubmed", query, "xml"));
    fs::write(&path, articles)?;
    tracing::info!("Saved {}", path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ids_from_esearch_result() {
        let xml = r#"<?xml version="1.0"?>
<eSearchResult><Count>2</Count><RetMax>2</RetMax>
  <IdList><Id>40000001</Id><Id> 40000002 </Id></IdList>
  <TranslationSet/>
</eSearchResult>"#;
        assert_eq!(parse_search_ids(xml).unwrap(), vec!["40000001", "40000002"]);
    }

    #[test]
    fn no_ids_in_empty_result() {
        let xml = "<eSearchResult><Count>0</Count><IdList/></eSearchResult>";
        assert!(parse_search_ids(xml).unwrap().is_empty());
    }
}
