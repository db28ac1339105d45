use std::collections::HashMap;

use chrono::FixedOffset;
use feed_rs::parser;
use tracing::{debug, info};

use crate::error::ParseError;
use crate::fetcher::RawFeed;
use crate::links::{normalize_domain, resolve_link};
use crate::model::NewsItem;

/// Elements carrying the publisher name of an RSS item.
const SOURCE_TAGS: &[&str] = &["source", "News:Source"];

pub struct FeedParser {
    max_per_feed: usize,
    offset: FixedOffset,
}

impl FeedParser {
    pub fn new(max_per_feed: usize, offset: FixedOffset) -> Self {
        Self {
            max_per_feed,
            offset,
        }
    }

    pub fn parse(&self, raw: &RawFeed) -> Result<Vec<NewsItem>, ParseError> {
        let feed_name = raw.source.name.as_str();

        // feed_rs doesn't expose <source>/<News:Source> text, so read it from the raw XML.
        // Keys go through the same link resolution as entries.
        let sources: HashMap<String, String> = Self::extract_sources_from_xml(&raw.body)
            .into_iter()
            .map(|(link, source)| (resolve_link(&link), source))
            .collect();

        let parsed = parser::parse(&raw.body[..])?;

        let mut items = Vec::new();
        for entry in parsed.entries {
            if items.len() >= self.max_per_feed {
                break;
            }

            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default();

            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .unwrap_or_default();

            if title.is_empty() || link.is_empty() {
                debug!("Skipping entry without title or link in '{}'", feed_name);
                continue;
            }

            let direct_link = resolve_link(&link);

            let source = sources
                .get(&direct_link)
                .cloned()
                .filter(|s| !s.is_empty())
                .or_else(|| normalize_domain(&direct_link))
                .unwrap_or_else(|| feed_name.to_string());

            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&self.offset));

            match NewsItem::new(title, source, published, direct_link, feed_name) {
                Some(item) => items.push(item),
                None => debug!("Skipping entry with empty title in '{}'", feed_name),
            }
        }

        info!("Parsed {} items from feed '{}'", items.len(), feed_name);
        Ok(items)
    }

    /// Maps each item's `<link>` to its source label.
    pub fn extract_sources_from_xml(xml_bytes: &[u8]) -> HashMap<String, String> {
        let mut sources = HashMap::new();
        let xml_str = match std::str::from_utf8(xml_bytes) {
            Ok(s) => s,
            Err(_) => return sources,
        };

        for item_block in xml_str.split("<item>").skip(1) {
            let item_end = item_block.find("</item>").unwrap_or(item_block.len());
            let item = &item_block[..item_end];

            let link = Self::extract_xml_element(item, "link");
            let source = SOURCE_TAGS
                .iter()
                .find_map(|tag| Self::extract_xml_element(item, tag));

            if let (Some(link), Some(source)) = (link, source) {
                sources.insert(link, source);
            }
        }

        sources
    }

    /// Text of the first `<tag>` element, attributes allowed, with CDATA
    /// unwrapped and entities decoded.
    pub fn extract_xml_element(xml: &str, tag: &str) -> Option<String> {
        let open = format!("<{}", tag);
        let end_tag = format!("</{}>", tag);

        let mut search_from = 0;
        let start = loop {
            let pos = xml[search_from..].find(&open)? + search_from;
            let after = pos + open.len();
            match xml[after..].chars().next() {
                Some('>') => break after + 1,
                Some(c) if c.is_whitespace() => {
                    let close = xml[after..].find('>')? + after;
                    if xml[..close].ends_with('/') {
                        return Some(String::new());
                    }
                    break close + 1;
                }
                // a longer tag name sharing the prefix
                _ => search_from = after,
            }
        };
        let end = xml[start..].find(&end_tag)? + start;

        let text = xml[start..end].trim();
        let text = text
            .strip_prefix("<![CDATA[")
            .and_then(|t| t.strip_suffix("]]>"))
            .unwrap_or(text);

        Some(html_escape::decode_html_entities(text.trim()).into_owned())
    }
}
