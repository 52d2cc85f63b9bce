//! Crawler module: the concurrent crawl engine and its collaborators
//!
//! This module contains:
//! - the crawl engine (queues, worker pool, completion detection)
//! - in-flight accounting used to detect when the crawl has drained
//! - the HTTP fetch capability
//! - per-response rule application (save, extract, follow)

mod engine;
mod fetcher;
mod handler;
mod tracker;

pub use engine::{Engine, EngineHandle, Fetched};
pub use fetcher::{build_http_client, Fetch, HttpFetcher, Response};
pub use handler::{Outcome, ResponseHandler, UrlSink};
pub use tracker::{InFlight, InFlightCounts, TaskGuard};

use crate::config::Config;
use crate::output::CrawlReport;
use crate::FlyError;

/// Runs a complete crawl over HTTP and waits for it to finish
///
/// # Arguments
///
/// * `config` - The mirror configuration
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl ran to completion (or was stopped)
/// * `Err(FlyError)` - Engine could not be created
pub async fn run(config: Config) -> Result<CrawlReport, FlyError> {
    Ok(Engine::with_http(config)?.run().await)
}
