use tracing::{error, info, warn};

use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::fetcher::{Fetcher, RawFeed};
use crate::filter::ContentFilter;
use crate::model::NewsItem;
use crate::parser::FeedParser;
use crate::render::{load_snapshot, rank, Renderer};

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub feeds_total: usize,
    /// Feeds fetched and parsed without error
    pub feeds_ok: usize,
    /// Items parsed from this run's feeds
    pub fresh_items: usize,
    /// Items entering the pipeline, including those carried over from the
    /// previous snapshot
    pub raw_items: usize,
    pub written_items: usize,
}

impl RunReport {
    /// No configured feed produced a single item, either because every
    /// feed failed or because the ones that answered were empty.
    pub fn is_total_failure(&self) -> bool {
        self.feeds_total > 0 && (self.feeds_ok == 0 || self.fresh_items == 0)
    }

    /// Process exit status: 0 unless the run was a total failure.
    pub fn exit_status(&self) -> u8 {
        if self.is_total_failure() {
            1
        } else {
            0
        }
    }
}

/// Fetches every configured source and writes both output files.
pub async fn run(config: &Config) -> anyhow::Result<RunReport> {
    let sources = config.feed_sources();
    let offset = config.output.offset()?;

    let fetcher = Fetcher::new(&config.fetch)?;
    let feeds = fetcher.fetch_all(&sources).await;

    let parser = FeedParser::new(config.fetch.max_items_per_feed, offset);
    let (mut items, feeds_ok) = parse_all(&parser, &feeds);
    let fresh_items = items.len();

    if config.output.keep_previous {
        let previous = load_snapshot(&config.output.json_path());
        if !previous.is_empty() {
            info!("Carrying over {} items from previous snapshot", previous.len());
        }
        items.extend(previous);
    }
    let raw_items = items.len();

    let processed = process(config, items);

    let renderer = Renderer::new(&config.output, offset);
    renderer.write(&processed)?;

    let report = RunReport {
        feeds_total: sources.len(),
        feeds_ok,
        fresh_items,
        raw_items,
        written_items: processed.len(),
    };

    if report.is_total_failure() {
        error!(
            "No items from {} feeds ({} answered); output holds carried-over items only",
            report.feeds_total, report.feeds_ok
        );
    } else {
        info!(
            "Run complete: {}/{} feeds, {} raw items, {} written",
            report.feeds_ok, report.feeds_total, report.raw_items, report.written_items
        );
    }

    Ok(report)
}

fn parse_all(parser: &FeedParser, feeds: &[RawFeed]) -> (Vec<NewsItem>, usize) {
    let mut items = Vec::new();
    let mut ok = 0;

    for feed in feeds {
        match parser.parse(feed) {
            Ok(parsed) => {
                ok += 1;
                items.extend(parsed);
            }
            Err(e) => warn!("Skipping feed '{}': {}", feed.source.name, e),
        }
    }

    (items, ok)
}

/// Filter, deduplicate, rank and cap a batch of items. Pure and
/// deterministic for a given input order.
pub fn process(config: &Config, items: Vec<NewsItem>) -> Vec<NewsItem> {
    let filter = ContentFilter::from_config(&config.filter);
    let is_trusted = |item: &NewsItem| filter.is_trusted(item);

    let accepted = filter.apply(filter.screen(items));
    let mut kept =
        Deduplicator::new(config.dedup.similarity_threshold, is_trusted).dedupe(accepted);

    rank(&mut kept, config.output.prioritize_trusted, is_trusted);
    kept.truncate(config.output.cache_limit);
    kept
}
