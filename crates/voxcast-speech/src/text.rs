//! Text normalization applied before synthesis.
//!
//! Upstream language models emit markdown; reading `**` or code fences
//! aloud is jarring, so the markers are stripped before the text reaches a
//! vendor backend.

use regex::Regex;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]*)`").unwrap());
static IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*[-*+]\s+").unwrap());
static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*>\s?").unwrap());
static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_]{1,3}([^*_]+)[*_]{1,3}").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip markdown markers so only speakable text remains.
pub fn clean_markdown(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, " ");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = HEADING.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "$1");
    normalize_whitespace(&text)
}

/// Collapse runs of whitespace into single spaces and trim the ends.
///
/// Also used to normalize text before cache key derivation, so that
/// re-wrapped copies of the same utterance hit the same entry.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_headings_and_emphasis() {
        let cleaned = clean_markdown("# Title\n\nThis is **bold** and _quiet_.");
        assert_eq!(cleaned, "Title This is bold and quiet.");
    }

    #[test]
    fn test_strips_links_and_code() {
        let cleaned = clean_markdown("See [the docs](https://example.com) and `inline`.");
        assert_eq!(cleaned, "See the docs and inline.");

        let cleaned = clean_markdown("before\n```rust\nlet x = 1;\n```\nafter");
        assert_eq!(cleaned, "before after");
    }

    #[test]
    fn test_strips_list_markers() {
        let cleaned = clean_markdown("- first\n- second\n> quoted");
        assert_eq!(cleaned, "first second quoted");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(clean_markdown("你好，这是测试"), "你好，这是测试");
    }

    #[test]
    fn test_whitespace_normalization() {
        assert_eq!(normalize_whitespace("  a\n\tb  c "), "a b c");
    }
}
