use std::path::{Path, PathBuf};

use anyhow::bail;
use chrono::FixedOffset;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::Deserialize;

use crate::fetcher::FeedSource;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum number of feeds fetched at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_items_per_feed")]
    pub max_items_per_feed: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
            max_items_per_feed: default_max_items_per_feed(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_concurrency() -> usize {
    8
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; WuxiAINewsBot/2.0; +https://wuxiai.com/)".to_string()
}

fn default_max_items_per_feed() -> usize {
    20
}

/// Keyword searches expanded into feed URLs through `url_template`.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Search URL with a `{query}` placeholder
    #[serde(default = "default_url_template")]
    pub url_template: String,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Sites each keyword is additionally scoped to with `site:`
    #[serde(default)]
    pub site_filters: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url_template: default_url_template(),
            name_prefix: default_name_prefix(),
            keywords: Vec::new(),
            site_filters: Vec::new(),
        }
    }
}

fn default_url_template() -> String {
    "https://www.bing.com/news/search?q={query}&format=RSS&setlang=zh-hans".to_string()
}

fn default_name_prefix() -> String {
    "bing".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub blocked_keywords: Vec<String>,
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    #[serde(default)]
    pub blocked_sources: Vec<String>,
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    #[serde(default)]
    pub trusted_sources: Vec<String>,
    #[serde(default)]
    pub relevance_keywords: Vec<String>,
    #[serde(default)]
    pub location_keywords: Vec<String>,
    #[serde(default)]
    pub topic_keywords: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DedupConfig {
    /// Normalized Levenshtein similarity at which two titles are merged.
    /// 1.0 keeps exact fingerprint matching only.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.85
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_html_file")]
    pub html_file: String,
    #[serde(default = "default_json_file")]
    pub json_file: String,
    /// Items shown on the HTML page
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Items per source shown on the HTML page
    #[serde(default = "default_max_per_source")]
    pub max_per_source: usize,
    /// Items kept in the JSON snapshot
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,
    /// Feed the previous snapshot back in as input
    #[serde(default = "default_true")]
    pub keep_previous: bool,
    #[serde(default)]
    pub prioritize_trusted: bool,
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            html_file: default_html_file(),
            json_file: default_json_file(),
            max_items: default_max_items(),
            max_per_source: default_max_per_source(),
            cache_limit: default_cache_limit(),
            keep_previous: true,
            prioritize_trusted: false,
            utc_offset_hours: default_utc_offset_hours(),
            page: PageConfig::default(),
            links: Vec::new(),
        }
    }
}

impl OutputConfig {
    pub fn html_path(&self) -> PathBuf {
        self.dir.join(&self.html_file)
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join(&self.json_file)
    }

    pub fn offset(&self) -> anyhow::Result<FixedOffset> {
        match FixedOffset::east_opt(self.utc_offset_hours * 3600) {
            Some(offset) => Ok(offset),
            None => bail!("utc_offset_hours out of range: {}", self.utc_offset_hours),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_html_file() -> String {
    "index.html".to_string()
}

fn default_json_file() -> String {
    "data.json".to_string()
}

fn default_max_items() -> usize {
    12
}

fn default_max_per_source() -> usize {
    3
}

fn default_cache_limit() -> usize {
    120
}

fn default_true() -> bool {
    true
}

fn default_utc_offset_hours() -> i32 {
    8
}

/// Fixed texts of the HTML page.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PageConfig {
    pub lang: String,
    pub title: String,
    pub description: String,
    pub meta_keywords: String,
    pub tagline: String,
    pub empty_message: String,
    pub unknown_source: String,
    pub unknown_time: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            lang: "zh-CN".to_string(),
            title: "无锡AI".to_string(),
            description: "无锡AI新闻与无锡人工智能新闻聚合，聚焦无锡与人工智能相关资讯。"
                .to_string(),
            meta_keywords: "无锡AI新闻, 无锡人工智能新闻, 无锡AI, 无锡人工智能".to_string(),
            tagline: "自动更新，仅提供标题与原文链接。".to_string(),
            empty_message: "暂无可展示的新闻，请稍后再试。".to_string(),
            unknown_source: "未知来源".to_string(),
            unknown_time: "时间未知".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    pub label: String,
    pub url: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feed_sources().is_empty() {
            bail!("no feed sources configured: add [search] keywords or [[feeds]] entries");
        }
        if !self.search.keywords.is_empty() && !self.search.url_template.contains("{query}") {
            bail!("search.url_template must contain a {{query}} placeholder");
        }
        let threshold = self.dedup.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            bail!("dedup.similarity_threshold must be in (0, 1], got {}", threshold);
        }
        if self.fetch.concurrency == 0 {
            bail!("fetch.concurrency must be at least 1");
        }
        self.output.offset()?;
        Ok(())
    }

    /// All sources to fetch: keyword searches first, then explicit feeds.
    pub fn feed_sources(&self) -> Vec<FeedSource> {
        let search = &self.search;
        let mut sources = Vec::new();

        for keyword in &search.keywords {
            sources.push(FeedSource {
                name: format!("{}:{}", search.name_prefix, keyword),
                url: search.url_for(keyword),
            });
            for site in &search.site_filters {
                sources.push(FeedSource {
                    name: format!("{}:{}:{}", search.name_prefix, keyword, site),
                    url: search.url_for(&format!("{} site:{}", keyword, site)),
                });
            }
        }

        sources.extend(self.feeds.iter().map(|feed| FeedSource {
            name: feed.name.clone(),
            url: feed.url.clone(),
        }));

        sources
    }
}

impl SearchConfig {
    pub fn url_for(&self, query: &str) -> String {
        let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
        self.url_template.replace("{query}", &encoded)
    }
}
