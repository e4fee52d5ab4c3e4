//! PubMed efetch XML: one unit per `PubmedArticle`.
//!
//! The unit text is the article title, a blank line, then the first abstract
//! paragraph. The first `PMID` inside the article is its identifier; an article
//! without one is a unit error, not a document error.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ExtractionError;
use crate::traits::UnitResult;
use crate::types::TextUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Abstract,
    Pmid,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"ArticleTitle" => Some(Self::Title),
            b"AbstractText" => Some(Self::Abstract),
            b"PMID" => Some(Self::Pmid),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Article {
    title: Option<String>,
    abstract_text: Option<String>,
    pmid: Option<String>,
}

impl Article {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Abstract => &mut self.abstract_text,
            Field::Pmid => &mut self.pmid,
        }
    }

    fn into_unit(self, name: &str, index: usize) -> UnitResult {
        let pmid = self.pmid.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());
        let Some(pmid) = pmid else {
            return Err(ExtractionError::MissingField { name: name.to_string(), index, field: "PMID" });
        };
        let text = format!(
            "{}\n\n{}",
            self.title.unwrap_or_default().trim(),
            self.abstract_text.unwrap_or_default().trim()
        );
        Ok(TextUnit::new(text, format!("PMID: {}", pmid)))
    }
}

/// Text captured for one field, with nesting depth for inline markup like `<i>`.
struct Capture {
    field: Field,
    text: String,
    depth: usize,
}

pub fn extract_articles(name: &str, bytes: &[u8]) -> Result<Vec<UnitResult>, ExtractionError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut units = Vec::new();
    let mut current: Option<Article> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = e.name();
                if tag.as_ref() == b"PubmedArticle" {
                    current = Some(Article::default());
                    capture = None;
                } else if let Some(c) = capture.as_mut() {
                    c.depth += 1;
                } else if let (Some(article), Some(field)) = (current.as_mut(), Field::from_tag(tag.as_ref())) {
                    if article.slot(field).is_none() {
                        capture = Some(Capture { field, text: String::new(), depth: 0 });
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"PubmedArticle" {
                    if let Some(article) = current.take() {
                        let index = units.len();
                        units.push(article.into_unit(name, index));
                    }
                    capture = None;
                } else if let Some(c) = capture.as_mut() {
                    if c.depth > 0 {
                        c.depth -= 1;
                    } else if let (Some(done), Some(article)) = (capture.take(), current.as_mut()) {
                        *article.slot(done.field) = Some(done.text);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(c) = capture.as_mut() {
                    let text = e.unescape().map_err(|err| ExtractionError::malformed(name, err))?;
                    c.text.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(c) = capture.as_mut() {
                    c.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::malformed(
                    name,
                    format!("XML error at byte {}: {}", reader.buffer_position(), e),
                ))
            }
            _ => {}
        }
        buf.clear();
    }

    tracing::debug!("{}: {} article(s)", name, units.len());
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">111</PMID>
      <Article>
        <ArticleTitle>Sepsis <i>bundles</i> &amp; outcomes</ArticleTitle>
        <Abstract>
          <AbstractText>First paragraph.</AbstractText>
          <AbstractText>Second paragraph.</AbstractText>
        </Abstract>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ReferenceList><Reference><ArticleIdList><PMID>999</PMID></ArticleIdList></Reference></ReferenceList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <Article><ArticleTitle>No identifier</ArticleTitle></Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn extracts_title_first_abstract_and_first_pmid() {
        let units = extract_articles("batch.xml", SAMPLE.as_bytes()).unwrap();
        assert_eq!(units.len(), 2);
        let first = units[0].as_ref().unwrap();
        assert_eq!(first.source, "PMID: 111");
        assert_eq!(first.text, "Sepsis bundles & outcomes\n\nFirst paragraph.");
    }

    #[test]
    fn missing_pmid_is_a_unit_error() {
        let units = extract_articles("batch.xml", SAMPLE.as_bytes()).unwrap();
        assert_eq!(
            units[1],
            Err(ExtractionError::MissingField { name: "batch.xml".into(), index: 1, field: "PMID" })
        );
    }

    #[test]
    fn truncated_xml_fails_the_document() {
        let result = extract_articles("bad.xml", b"<PubmedArticleSet><PubmedArticle></Wrong>");
        assert!(matches!(result, Err(ExtractionError::Malformed { .. })));
    }
}
