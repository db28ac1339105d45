use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use askama::Template;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{LinkConfig, OutputConfig, PageConfig};
use crate::error::OutputError;
use crate::model::NewsItem;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub page: &'a PageConfig,
    pub items: Vec<PageItem>,
    pub links: &'a [LinkConfig],
}

pub struct PageItem {
    pub title: String,
    pub link: String,
    pub source: String,
    pub time: String,
}

/// One entry of the JSON snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub title: String,
    pub source: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub link: String,
}

impl From<&NewsItem> for ItemRecord {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            source: item.source.clone(),
            published_at: item.published_at,
            link: item.link.clone(),
        }
    }
}

/// Newest first with unknown times last; ties broken by title then link so
/// the order is fully deterministic. With `prioritize_trusted`, trusted items
/// precede all others.
pub fn rank<F>(items: &mut [NewsItem], prioritize_trusted: bool, is_trusted: F)
where
    F: Fn(&NewsItem) -> bool,
{
    items.sort_by(|a, b| {
        let trust = if prioritize_trusted {
            is_trusted(b).cmp(&is_trusted(a))
        } else {
            Ordering::Equal
        };
        let time = match (a.published_at, b.published_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        trust
            .then(time)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.link.cmp(&b.link))
    });
}

pub struct Renderer<'a> {
    config: &'a OutputConfig,
    offset: FixedOffset,
}

impl<'a> Renderer<'a> {
    pub fn new(config: &'a OutputConfig, offset: FixedOffset) -> Self {
        Self { config, offset }
    }

    /// Items shown on the page: at most `max_items`, at most
    /// `max_per_source` from any single source.
    pub fn select_for_page<'i>(&self, items: &'i [NewsItem]) -> Vec<&'i NewsItem> {
        let mut per_source: HashMap<&str, usize> = HashMap::new();
        let mut selected = Vec::new();

        for item in items {
            if selected.len() >= self.config.max_items {
                break;
            }
            let count = per_source.entry(self.source_label(item)).or_insert(0);
            if *count >= self.config.max_per_source {
                continue;
            }
            *count += 1;
            selected.push(item);
        }

        selected
    }

    fn source_label<'i>(&'i self, item: &'i NewsItem) -> &'i str {
        let source = item.source.trim();
        if source.is_empty() {
            self.config.page.unknown_source.as_str()
        } else {
            source
        }
    }

    fn format_time(&self, published: Option<DateTime<FixedOffset>>) -> String {
        match published {
            Some(t) => t.with_timezone(&self.offset).format(TIME_FORMAT).to_string(),
            None => self.config.page.unknown_time.clone(),
        }
    }

    pub fn render_html(&self, items: &[NewsItem]) -> Result<String, OutputError> {
        let page_items = self
            .select_for_page(items)
            .into_iter()
            .map(|item| PageItem {
                title: item.title.clone(),
                link: item.link.clone(),
                source: self.source_label(item).to_string(),
                time: self.format_time(item.published_at),
            })
            .collect();

        let template = IndexTemplate {
            page: &self.config.page,
            items: page_items,
            links: &self.config.links,
        };
        Ok(template.render()?)
    }

    pub fn render_json(&self, items: &[NewsItem]) -> Result<String, OutputError> {
        let records: Vec<ItemRecord> = items
            .iter()
            .map(|item| {
                let mut record = ItemRecord::from(item);
                record.published_at = record.published_at.map(|t| t.with_timezone(&self.offset));
                record
            })
            .collect();
        let mut json = serde_json::to_string_pretty(&records)?;
        json.push('\n');
        Ok(json)
    }

    /// Renders both documents before touching the filesystem, then replaces
    /// each file through a temporary sibling and a rename.
    pub fn write(&self, items: &[NewsItem]) -> Result<(), OutputError> {
        let json = self.render_json(items)?;
        let html = self.render_html(items)?;

        std::fs::create_dir_all(&self.config.dir)?;
        write_replace(&self.config.json_path(), &json)?;
        write_replace(&self.config.html_path(), &html)?;

        info!(
            "Wrote {} items to {} and {}",
            items.len(),
            self.config.json_path().display(),
            self.config.html_path().display()
        );
        Ok(())
    }
}

fn write_replace(path: &Path, content: &str) -> Result<(), OutputError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Items of a previous snapshot. A missing or unreadable file yields none.
pub fn load_snapshot(path: &Path) -> Vec<NewsItem> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };

    let records: Vec<ItemRecord> = match serde_json::from_str(&content) {
        Ok(records) => records,
        Err(e) => {
            warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    records
        .into_iter()
        .filter_map(|r| NewsItem::new(r.title, r.source, r.published_at, r.link, "snapshot"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn at(rfc3339: &str) -> Option<DateTime<FixedOffset>> {
        Some(DateTime::parse_from_rfc3339(rfc3339).unwrap())
    }

    fn item(
        title: &str,
        source: &str,
        link: &str,
        published: Option<DateTime<FixedOffset>>,
    ) -> NewsItem {
        NewsItem::new(title, source, published, link, "feed").unwrap()
    }

    fn cst() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    fn output(dir: PathBuf) -> OutputConfig {
        OutputConfig {
            dir,
            ..OutputConfig::default()
        }
    }

    mod rank_tests {
        use super::*;

        #[test]
        fn test_newest_first_unknown_last() {
            let mut items = vec![
                item("old", "s", "https://a.com/1", at("2026-10-16T08:00:00+08:00")),
                item("unknown", "s", "https://a.com/2", None),
                item("new", "s", "https://a.com/3", at("2026-10-17T08:00:00Z")),
                item("mid", "s", "https://a.com/4", at("2026-10-17T08:00:00+08:00")),
            ];

            rank(&mut items, false, |_| false);
            let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
            assert_eq!(titles, vec!["new", "mid", "old", "unknown"]);
        }

        #[test]
        fn test_ties_broken_by_title() {
            let t = at("2026-10-17T08:00:00+08:00");
            let mut items = vec![
                item("b", "s", "https://a.com/1", t),
                item("a", "s", "https://a.com/2", t),
            ];

            rank(&mut items, false, |_| false);
            assert_eq!(items[0].title, "a");
        }

        #[test]
        fn test_prioritize_trusted() {
            let mut items = vec![
                item("newer", "自媒体", "https://a.com/1", at("2026-10-17T12:00:00+08:00")),
                item("older", "新华网", "https://b.com/1", at("2026-10-17T08:00:00+08:00")),
            ];

            rank(&mut items, true, |i| i.source == "新华网");
            assert_eq!(items[0].title, "older");

            rank(&mut items, false, |i| i.source == "新华网");
            assert_eq!(items[0].title, "newer");
        }
    }

    mod page_tests {
        use super::*;

        #[test]
        fn test_select_caps_per_source_and_total() {
            let config = OutputConfig {
                max_items: 4,
                max_per_source: 2,
                ..OutputConfig::default()
            };
            let renderer = Renderer::new(&config, cst());
            let numbered = |prefix: &str, i: usize| {
                let link = format!("https://{}.com/{i}", prefix.to_lowercase());
                item(&format!("{}{i}", prefix.to_lowercase()), prefix, &link, None)
            };
            let items: Vec<NewsItem> = (0..6)
                .map(|i| numbered("A", i))
                .chain((0..6).map(|i| numbered("B", i)))
                .collect();

            let selected = renderer.select_for_page(&items);
            let titles: Vec<&str> = selected.iter().map(|i| i.title.as_str()).collect();
            assert_eq!(titles, vec!["a0", "a1", "b0", "b1"]);
        }

        #[test]
        fn test_html_contains_items_and_escapes() {
            let config = OutputConfig::default();
            let renderer = Renderer::new(&config, cst());
            let items = vec![
                item(
                    "无锡AI峰会 <b>开幕</b>",
                    "新华网",
                    "https://xinhuanet.com/1",
                    at("2026-10-17T02:30:00Z"),
                ),
                item("无锡大模型", "", "https://a.com/2", None),
            ];

            let html = renderer.render_html(&items).unwrap();
            assert!(html.contains("<title>无锡AI</title>"));
            assert!(html.contains("无锡AI峰会 &lt;b&gt;开幕&lt;"));
            assert!(!html.contains("<b>开幕</b>"));
            assert!(html.contains("新华网 | 2026-10-17 10:30"));
            assert!(html.contains("未知来源 | 时间未知"));
            assert!(!html.contains("暂无可展示的新闻"));
        }

        #[test]
        fn test_html_empty_message() {
            let config = OutputConfig::default();
            let renderer = Renderer::new(&config, cst());

            let html = renderer.render_html(&[]).unwrap();
            assert!(html.contains("暂无可展示的新闻，请稍后再试。"));
            assert!(!html.contains("<ul>"));
        }

        #[test]
        fn test_html_footer_links() {
            let config = OutputConfig {
                links: vec![LinkConfig {
                    label: "robot.tv".to_string(),
                    url: "https://robot.tv".to_string(),
                }],
                ..OutputConfig::default()
            };
            let renderer = Renderer::new(&config, cst());

            let html = renderer.render_html(&[]).unwrap();
            assert!(html.contains("robot.tv</a>"));
        }
    }

    mod snapshot_tests {
        use super::*;

        #[test]
        fn test_json_has_plain_fields() {
            let config = OutputConfig::default();
            let renderer = Renderer::new(&config, cst());
            let items = vec![
                item("无锡AI峰会", "新华网", "https://xinhuanet.com/1", at("2026-10-17T02:30:00Z")),
                item("无锡大模型", "s", "https://a.com/2", None),
            ];

            let json = renderer.render_json(&items).unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            let array = value.as_array().unwrap();

            assert_eq!(array.len(), 2);
            assert_eq!(array[0]["title"], "无锡AI峰会");
            assert_eq!(array[0]["source"], "新华网");
            assert_eq!(array[0]["link"], "https://xinhuanet.com/1");
            assert_eq!(array[0]["published_at"], "2026-10-17T10:30:00+08:00");
            assert!(array[1]["published_at"].is_null());
            assert_eq!(array[0].as_object().unwrap().len(), 4);
            // Non-ASCII text is written as-is
            assert!(json.contains("无锡AI峰会"));
        }

        #[test]
        fn test_write_then_load_snapshot() {
            let dir = tempfile::tempdir().unwrap();
            let config = output(dir.path().join("public"));
            let renderer = Renderer::new(&config, cst());
            let items = vec![
                item(
                    "无锡AI峰会",
                    "新华网",
                    "https://xinhuanet.com/1",
                    at("2026-10-17T10:30:00+08:00"),
                ),
                item("无锡大模型", "s", "https://a.com/2", None),
            ];

            renderer.write(&items).unwrap();

            assert!(config.html_path().exists());
            let loaded = load_snapshot(&config.json_path());
            assert_eq!(loaded.len(), 2);
            assert_eq!(loaded[0].title, items[0].title);
            assert_eq!(loaded[0].fingerprint, items[0].fingerprint);
            assert_eq!(loaded[0].published_at, items[0].published_at);
            assert_eq!(loaded[1].published_at, None);
            assert_eq!(loaded[0].feed, "snapshot");
        }

        #[test]
        fn test_write_overwrites_previous_output() {
            let dir = tempfile::tempdir().unwrap();
            let config = output(dir.path().to_path_buf());
            let renderer = Renderer::new(&config, cst());

            renderer
                .write(&[item("无锡AI峰会", "s", "https://a.com/1", None)])
                .unwrap();
            renderer.write(&[]).unwrap();

            let json = std::fs::read_to_string(config.json_path()).unwrap();
            assert_eq!(json.trim(), "[]");
            assert!(load_snapshot(&config.json_path()).is_empty());
        }

        #[test]
        fn test_load_missing_or_invalid_snapshot() {
            let dir = tempfile::tempdir().unwrap();
            assert!(load_snapshot(&dir.path().join("missing.json")).is_empty());

            let bad = dir.path().join("bad.json");
            std::fs::write(&bad, "{\"items\": 3").unwrap();
            assert!(load_snapshot(&bad).is_empty());
        }
    }
}
