use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed feed: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to render template: {0}")]
    Template(#[from] askama::Error),
}
