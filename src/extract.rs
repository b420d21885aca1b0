//! Description extraction from HTML
//!
//! Picks the best short description a page offers, cleans it, and cuts it to
//! length without splitting a word.

use crate::config::DescribeConfig;
use encoding_rs::{Encoding, BIG5, GBK, SHIFT_JIS, UTF_8};
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Tried in order when neither the server nor the page declares a charset
const FALLBACK_ENCODINGS: [&Encoding; 4] = [UTF_8, GBK, BIG5, SHIFT_JIS];

/// Bytes scanned for a `<meta charset>` declaration
const SNIFF_LIMIT: usize = 1024;

static CHARSET_RE: LazyLock<BytesRegex> = LazyLock::new(|| {
    BytesRegex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#)
        .expect("charset pattern is valid")
});

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta").expect("meta selector is valid"));

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector is valid"));

#[derive(Debug, Clone)]
pub struct DescriptionExtractor {
    max_len: usize,
    suffix_re: Option<Regex>,
}

impl DescriptionExtractor {
    pub fn new(config: &DescribeConfig) -> Self {
        Self {
            max_len: config.max_len,
            suffix_re: suffix_pattern(&config.boilerplate_suffixes),
        }
    }

    /// Description for a page, or `None` when it has none or cannot be decoded.
    ///
    /// Precedence: meta description, og:description, `<title>`, og:title.
    pub fn extract(&self, html: &[u8], encoding_hint: Option<&str>) -> Option<String> {
        let text = decode_html(html, encoding_hint)?;
        let doc = Html::parse_document(&text);

        let sources = [
            meta_content(&doc, "name", "description"),
            meta_content(&doc, "property", "og:description"),
            title_text(&doc),
            meta_content(&doc, "property", "og:title"),
        ];
        sources
            .into_iter()
            .flatten()
            .find_map(|candidate| self.clean(&candidate))
    }

    /// Strip boilerplate, collapse whitespace, truncate; `None` if nothing is left
    pub fn clean(&self, text: &str) -> Option<String> {
        let mut text = collapse_whitespace(text);
        if let Some(re) = &self.suffix_re {
            loop {
                let stripped = re.replace(&text, "").trim().to_string();
                if stripped == text {
                    break;
                }
                text = stripped;
            }
        }

        if text.is_empty() {
            return None;
        }
        Some(truncate_at_word(&text, self.max_len))
    }
}

/// `Title - Home`, `Title | Official Site`, `标题_官网` ...
fn suffix_pattern(suffixes: &[String]) -> Option<Regex> {
    if suffixes.is_empty() {
        return None;
    }
    let alternatives = suffixes
        .iter()
        .map(|s| regex::escape(s.trim()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\s*[-|_:·–—｜]\s*(?:{})\s*$", alternatives)).ok()
}

fn meta_content(doc: &Html, attr: &str, value: &str) -> Option<String> {
    doc.select(&META_SELECTOR)
        .filter(|el| {
            el.value()
                .attr(attr)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(value))
        })
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

fn title_text(doc: &Html) -> Option<String> {
    doc.select(&TITLE_SELECTOR)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Decode page bytes strictly.
///
/// Order: byte-order mark, the HTTP charset hint, a `<meta charset>`
/// declaration, then [`FALLBACK_ENCODINGS`]. Malformed input rejects an
/// encoding instead of producing replacement characters.
pub fn decode_html(bytes: &[u8], encoding_hint: Option<&str>) -> Option<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return encoding
            .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
            .map(|text| text.into_owned());
    }

    let hinted = encoding_hint.and_then(|label| Encoding::for_label(label.trim().as_bytes()));
    let mut tried: Vec<&'static Encoding> = Vec::new();

    for encoding in hinted
        .into_iter()
        .chain(sniff_charset(bytes))
        .chain(FALLBACK_ENCODINGS)
    {
        if tried.contains(&encoding) {
            continue;
        }
        tried.push(encoding);
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return Some(text.into_owned());
        }
    }
    None
}

fn sniff_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = &bytes[..bytes.len().min(SNIFF_LIMIT)];
    let label = CHARSET_RE.captures(head)?.get(1)?.as_bytes();
    Encoding::for_label(label)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Letters and digits of space-separated scripts; CJK characters are words
/// on their own, so a cut next to one is always clean
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() && !is_cjk(c)
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{2E80}'..='\u{9FFF}'
        | '\u{AC00}'..='\u{D7AF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{FF00}'..='\u{FFEF}')
}

/// Cut to at most `max` characters at a word boundary, marking the cut with `...`
pub fn truncate_at_word(text: &str, max: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return text.to_string();
    }

    let cut = (1..=max)
        .rev()
        .find(|&i| !(is_word_char(chars[i - 1]) && is_word_char(chars[i])))
        .unwrap_or(max);
    let head: String = chars[..cut].iter().collect();
    format!("{}...", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> DescriptionExtractor {
        DescriptionExtractor::new(&DescribeConfig::default())
    }

    #[test]
    fn test_meta_description() {
        let html = br#"<head><meta name="description" content="Foo"></head>"#;
        assert_eq!(extractor().extract(html, None), Some("Foo".to_string()));
    }

    #[test]
    fn test_title_only() {
        let html = b"<html><head><title>Bar</title></head></html>";
        assert_eq!(extractor().extract(html, None), Some("Bar".to_string()));
    }

    #[test]
    fn test_empty_html() {
        assert_eq!(extractor().extract(b"", None), None);
        assert_eq!(extractor().extract(b"<html><head></head><body></body></html>", None), None);
    }

    #[test]
    fn test_meta_beats_title_and_empty_meta_is_skipped() {
        let html = br#"<head>
            <title>Title Text</title>
            <meta name="Description" content="   ">
            <meta property="og:description" content="From OpenGraph">
        </head>"#;
        assert_eq!(extractor().extract(html, None), Some("From OpenGraph".to_string()));
    }

    #[test]
    fn test_og_title_last() {
        let html = br#"<head><meta property="og:title" content="OG Title"></head>"#;
        assert_eq!(extractor().extract(html, None), Some("OG Title".to_string()));
    }

    #[test]
    fn test_clean_strips_boilerplate_and_whitespace() {
        let e = extractor();
        assert_eq!(e.clean("  GitHub \n\t - Home "), Some("GitHub".to_string()));
        assert_eq!(e.clean("Rust | Official Site"), Some("Rust".to_string()));
        assert_eq!(e.clean("百度一下_官网"), Some("百度一下".to_string()));
        assert_eq!(e.clean("Homebrew"), Some("Homebrew".to_string()));
        assert_eq!(e.clean("   "), None);
    }

    #[test]
    fn test_truncate_at_word() {
        assert_eq!(truncate_at_word("short", 10), "short");
        assert_eq!(truncate_at_word("hello wonderful world", 12), "hello...");
        assert_eq!(truncate_at_word("hello world again", 11), "hello world...");
        assert_eq!(truncate_at_word("超长的中文描述文本", 4), "超长的中...");
        assert_eq!(truncate_at_word("abcdefghij", 4), "abcd...");
    }

    #[test]
    fn test_truncation_never_splits_words() {
        let e = DescriptionExtractor::new(&DescribeConfig {
            max_len: 20,
            ..DescribeConfig::default()
        });
        let long = "The quick brown fox jumps over the lazy dog";
        let out = e.clean(long).unwrap();
        assert_eq!(out, "The quick brown fox...");
        let kept = out.trim_end_matches("...");
        assert!(long.split(' ').any(|w| kept.ends_with(w)));
    }

    #[test]
    fn test_decode_with_hint() {
        let (bytes, _, _) = GBK.encode("<title>中文标题</title>");
        assert_eq!(
            extractor().extract(&bytes, Some("gbk")),
            Some("中文标题".to_string())
        );
    }

    #[test]
    fn test_decode_with_meta_charset() {
        let (body, _, _) = GBK.encode("<title>简体中文</title>");
        let mut html = br#"<meta charset="gb2312">"#.to_vec();
        html.extend_from_slice(&body);
        assert_eq!(decode_html(&html, None).unwrap(), r#"<meta charset="gb2312"><title>简体中文</title>"#);
    }

    #[test]
    fn test_undecodable_is_none() {
        assert_eq!(decode_html(b"\xff\xff<title>x</title>", None), None);
        assert_eq!(extractor().extract(b"\xff\xff<title>x</title>", None), None);
    }

    #[test]
    fn test_utf8_bom() {
        let html = b"\xef\xbb\xbf<title>Bom</title>";
        assert_eq!(extractor().extract(html, None), Some("Bom".to_string()));
    }
}
