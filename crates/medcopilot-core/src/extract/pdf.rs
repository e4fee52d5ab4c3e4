use std::panic;

use crate::error::ExtractionError;
use crate::traits::UnitResult;
use crate::types::TextUnit;

use super::page_label;

/// One unit per PDF page, up to `max_pages`.
///
/// The PDF parser can panic on damaged files; that is reported as a malformed
/// document so the rest of the batch continues.
pub fn extract_pages(name: &str, bytes: &[u8], max_pages: usize) -> Result<Vec<UnitResult>, ExtractionError> {
    let pages = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| ExtractionError::malformed(name, "PDF parser aborted"))?
        .map_err(|e| ExtractionError::unreadable(name, e))?;

    if pages.len() > max_pages {
        tracing::debug!("{}: reading {} of {} pages", name, max_pages, pages.len());
    }
    Ok(pages
        .into_iter()
        .take(max_pages)
        .enumerate()
        .map(|(i, text)| Ok(TextUnit::new(text, page_label(name, i + 1))))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_the_document() {
        let result = extract_pages("broken.pdf", b"this is not a pdf", 10);
        assert!(result.is_err());
    }
}
