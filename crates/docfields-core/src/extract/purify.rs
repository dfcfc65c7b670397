//! Cleanup of extracted text values.

const BOM: char = '\u{feff}';
const FORM_FEED: char = '\x0c';

/// Clean an extracted value.
///
/// Extracted text often carries a leading BOM and form feeds, and line breaks
/// from the layout. The returned value is `src` with every `\n` removed; the
/// BOM and form feeds are left in place and only matter to [`is_blank`].
pub fn purify(src: &str) -> String {
    src.replace('\n', "")
}

/// Whether a value is empty once whitespace, BOMs and form feeds are ignored.
pub fn is_blank(value: &str) -> bool {
    value
        .trim_matches(|c: char| c.is_whitespace() || c == BOM || c == FORM_FEED)
        .is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_purify_removes_newlines_only() {
        assert_eq!(purify("AB\n12\n"), "AB12");
        assert_eq!(purify("\u{feff}\x0cAB\nC"), "\u{feff}\x0cABC");
        assert_eq!(purify("  a b  "), "  a b  ");
    }

    #[test]
    fn test_purify_idempotent() {
        for s in ["", "\n\n", "x\ny\r\nz", "\u{feff}abc\n", "\x0c\x0cq"] {
            let once = purify(s);
            assert_eq!(purify(&once), once);
        }
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank(" \n\t"));
        assert!(is_blank("\u{feff}\x0c\n"));
        assert!(!is_blank("\u{feff}0"));
    }
}
