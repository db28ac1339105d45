use tracing::{debug, info};

use crate::config::FilterConfig;
use crate::links::{domain_matches, is_http};
use crate::model::NewsItem;

/// Keyword and domain rules applied ahead of deduplication. Every list is
/// matched case-insensitively; an empty list disables its check.
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    blocked_keywords: Vec<String>,
    blocked_domains: Vec<String>,
    blocked_sources: Vec<String>,
    trusted_domains: Vec<String>,
    trusted_sources: Vec<String>,
    relevance_keywords: Vec<String>,
    location_keywords: Vec<String>,
    topic_keywords: Vec<String>,
}

fn lowered(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_str()))
}

/// Pure ASCII alphanumeric keywords such as `ai` only match where they are
/// not embedded in a longer ASCII word; anything else is a substring match.
fn contains_keyword(text: &str, keyword: &str) -> bool {
    if !keyword.chars().all(|c| c.is_ascii_alphanumeric()) {
        return text.contains(keyword);
    }

    text.match_indices(keyword).any(|(pos, _)| {
        let before = text[..pos].chars().next_back();
        let after = text[pos + keyword.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}

impl ContentFilter {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            blocked_keywords: lowered(&config.blocked_keywords),
            blocked_domains: lowered(&config.blocked_domains),
            blocked_sources: lowered(&config.blocked_sources),
            trusted_domains: lowered(&config.trusted_domains),
            trusted_sources: lowered(&config.trusted_sources),
            relevance_keywords: lowered(&config.relevance_keywords),
            location_keywords: lowered(&config.location_keywords),
            topic_keywords: lowered(&config.topic_keywords),
        }
    }

    pub fn is_trusted(&self, item: &NewsItem) -> bool {
        let domain_trusted = item.domain().is_some_and(|domain| {
            self.trusted_domains
                .iter()
                .any(|pattern| domain_matches(&domain, pattern))
        });
        domain_trusted || contains_any(&item.source.to_lowercase(), &self.trusted_sources)
    }

    /// Links that are not http(s), blocked domains and blocked sources.
    pub fn is_low_quality(&self, item: &NewsItem) -> bool {
        if !is_http(&item.link) {
            return true;
        }
        let Some(domain) = item.domain() else {
            return true;
        };
        if self
            .blocked_domains
            .iter()
            .any(|pattern| domain_matches(&domain, pattern))
        {
            return true;
        }
        contains_any(&item.source.to_lowercase(), &self.blocked_sources)
    }

    pub fn is_blocked_title(&self, title: &str) -> bool {
        contains_any(&title.trim().to_lowercase(), &self.blocked_keywords)
    }

    pub fn is_relevant(&self, item: &NewsItem) -> bool {
        if self.relevance_keywords.is_empty() {
            return true;
        }
        let text = format!("{} {} {}", item.title, item.link, item.source).to_lowercase();
        contains_any(&text, &self.relevance_keywords)
    }

    /// Title names a location and a topic.
    pub fn is_on_topic(&self, title: &str) -> bool {
        let title = title.to_lowercase();
        let has_location = self.location_keywords.is_empty()
            || contains_any(&title, &self.location_keywords);
        let has_topic = self.topic_keywords.is_empty()
            || self
                .topic_keywords
                .iter()
                .any(|k| contains_keyword(&title, k));
        has_location && has_topic
    }

    /// Drops low-quality items.
    pub fn screen(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        let before = items.len();
        let kept: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| {
                let low = self.is_low_quality(item);
                if low {
                    debug!("Screened out '{}' ({})", item.title, item.link);
                }
                !low
            })
            .collect();
        info!("Screening kept {}/{} items", kept.len(), before);
        kept
    }

    /// Drops blocklisted, irrelevant and off-topic items. Like [`Self::screen`]
    /// this runs on single items ahead of deduplication, so a rejected copy
    /// never stands in for an acceptable one of the same story.
    pub fn apply(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        let before = items.len();
        let kept: Vec<NewsItem> = items
            .into_iter()
            .filter(|item| {
                if self.is_blocked_title(&item.title) {
                    debug!("Dropping blocklisted '{}'", item.title);
                    return false;
                }
                if !self.is_relevant(item) || !self.is_on_topic(&item.title) {
                    debug!("Dropping off-topic '{}'", item.title);
                    return false;
                }
                true
            })
            .collect();
        info!("Filter kept {}/{} items", kept.len(), before);
        kept
    }
}
