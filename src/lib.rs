//! Wuxi AI News - a batch RSS news digest
//!
//! This crate fetches keyword searches and RSS feeds, drops advertising and
//! duplicate stories, and renders the result as a static `index.html` page
//! plus a `data.json` snapshot.

pub mod config;
pub mod dedup;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod links;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod render;
