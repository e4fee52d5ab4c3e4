use crate::traits::UnitResult;
use crate::types::TextUnit;

use super::page_label;

const PAGE_BREAK: char = '\x0C';

/// Plain text, one unit per form-feed separated page. Invalid UTF-8 is read lossily.
pub fn extract_pages(name: &str, bytes: &[u8]) -> Vec<UnitResult> {
    let content = String::from_utf8_lossy(bytes);
    content
        .split(PAGE_BREAK)
        .enumerate()
        .map(|(i, page)| Ok(TextUnit::new(page, page_label(name, i + 1))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_without_breaks() {
        let units = extract_pages("a.txt", b"just one page");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].as_ref().unwrap().source, "a.txt — Page 1");
    }

    #[test]
    fn lossy_on_invalid_utf8() {
        let units = extract_pages("bad.txt", &[b'o', b'k', 0xFF, b'!']);
        let text = &units[0].as_ref().unwrap().text;
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
    }
}
