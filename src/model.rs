use chrono::{DateTime, FixedOffset};
use sha2::{Digest, Sha256};

use crate::links::normalize_domain;

/// Longest trailing ` - suffix` treated as a source attribution.
const MAX_SUFFIX_CHARS: usize = 12;

/// One news entry after parsing. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub link: String,
    /// Hash of the normalized title
    pub fingerprint: String,
    /// Name of the feed the entry came from
    pub feed: String,
}

impl NewsItem {
    /// Returns `None` when the title has no content left after normalization.
    pub fn new(
        title: impl Into<String>,
        source: impl Into<String>,
        published_at: Option<DateTime<FixedOffset>>,
        link: impl Into<String>,
        feed: impl Into<String>,
    ) -> Option<Self> {
        let title = title.into();
        let key = normalize_title(&title);
        if key.is_empty() {
            return None;
        }

        Some(Self {
            fingerprint: fingerprint(&key),
            title,
            source: source.into(),
            published_at,
            link: link.into(),
            feed: feed.into(),
        })
    }

    pub fn domain(&self) -> Option<String> {
        normalize_domain(&self.link)
    }

    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Case-folded title with entities decoded, a short trailing ` - source`
/// attribution removed, and all whitespace and punctuation dropped.
pub fn normalize_title(title: &str) -> String {
    let decoded = html_escape::decode_html_entities(title);
    let lowered = decoded.trim().to_lowercase();
    let mut collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(pos) = collapsed.rfind(" - ") {
        if collapsed[pos + 3..].chars().count() <= MAX_SUFFIX_CHARS {
            collapsed.truncate(pos);
        }
    }

    collapsed
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

pub fn fingerprint(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> NewsItem {
        NewsItem::new(title, "src", None, "https://example.com/a", "feed").unwrap()
    }

    #[test]
    fn test_whitespace_and_punctuation_are_ignored() {
        assert_eq!(normalize_title("无锡 人工智能，峰会！ "), "无锡人工智能峰会");
        assert_eq!(
            item("无锡 人工智能 峰会").fingerprint,
            item("无锡人工智能峰会 ").fingerprint
        );
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(normalize_title("Wuxi AI Summit"), "wuxiaisummit");
        assert_eq!(item("WUXI ai summit").fingerprint, item("wuxi AI Summit").fingerprint);
    }

    #[test]
    fn test_html_entities_are_decoded() {
        assert_eq!(normalize_title("R&amp;D 中心"), "rd中心");
    }

    #[test]
    fn test_short_source_suffix_is_stripped() {
        assert_eq!(normalize_title("无锡发布AI规划 - 新华网"), "无锡发布ai规划");
        assert_eq!(
            item("无锡发布AI规划 - 新华网").fingerprint,
            item("无锡发布AI规划 - 澎湃新闻").fingerprint
        );
    }

    #[test]
    fn test_long_suffix_is_kept() {
        assert_eq!(
            normalize_title("AI - a rather long continuation of the headline"),
            "aiaratherlongcontinuationoftheheadline"
        );
    }

    #[test]
    fn test_different_titles_differ() {
        assert_ne!(item("无锡AI峰会").fingerprint, item("苏州AI峰会").fingerprint);
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let fp = item("无锡AI峰会").fingerprint;
        assert_eq!(fp.len(), 16);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_title_is_rejected() {
        assert!(NewsItem::new("  —— ！ ", "s", None, "https://a.com", "f").is_none());
        assert!(NewsItem::new("", "s", None, "https://a.com", "f").is_none());
    }

    #[test]
    fn test_domain() {
        let item = NewsItem::new("t", "s", None, "https://www.thepaper.cn/x", "f").unwrap();
        assert_eq!(item.domain(), Some("thepaper.cn".to_string()));
    }
}
