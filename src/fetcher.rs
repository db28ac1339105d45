use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tracing::{info, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;

/// A feed endpoint to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

/// Raw response body of a successfully fetched feed.
#[derive(Debug, Clone)]
pub struct RawFeed {
    pub source: FeedSource,
    pub body: Vec<u8>,
}

pub struct Fetcher {
    client: Client,
    concurrency: usize,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            concurrency: config.concurrency.max(1),
        })
    }

    /// Fetches every source with at most `concurrency` requests in flight.
    /// Failed sources are logged and left out; results keep source order.
    pub async fn fetch_all(&self, sources: &[FeedSource]) -> Vec<RawFeed> {
        info!("Fetching {} feeds", sources.len());

        let results: Vec<(&FeedSource, Result<Vec<u8>, FetchError>)> = stream::iter(sources)
            .map(|source| async move { (source, self.fetch(source).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut feeds = Vec::with_capacity(results.len());
        for (source, result) in results {
            match result {
                Ok(body) => feeds.push(RawFeed {
                    source: source.clone(),
                    body,
                }),
                Err(e) => warn!("Skipping feed '{}' ({}): {}", source.name, source.url, e),
            }
        }

        info!("Fetched {}/{} feeds", feeds.len(), sources.len());
        feeds
    }

    pub async fn fetch(&self, source: &FeedSource) -> Result<Vec<u8>, FetchError> {
        info!("Fetching feed: {} ({})", source.name, source.url);

        let response = self.client.get(&source.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}
