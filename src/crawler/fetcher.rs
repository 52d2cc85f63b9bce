//! HTTP fetcher implementation
//!
//! The engine only sees the [`Fetch`] trait: one call per URL returning
//! either a [`Response`] or a [`TransportError`]. [`HttpFetcher`] is the
//! production implementation on top of `reqwest`.
//!
//! Non-2xx statuses are not transport errors. They come back as ordinary
//! responses and go through rule matching like any other page.

use crate::config::FetchConfig;
use crate::TransportError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// A fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL of the final request, after redirects
    pub request_url: String,

    /// HTTP status code
    pub status: u16,

    /// Body exactly as received
    pub body: Vec<u8>,

    /// Body decoded as UTF-8, invalid sequences replaced
    pub text: String,
}

impl Response {
    /// Builds a response, deriving `text` from `body`
    pub fn new(request_url: impl Into<String>, status: u16, body: Vec<u8>) -> Self {
        let text = String::from_utf8_lossy(&body).into_owned();
        Self {
            request_url: request_url.into(),
            status,
            body,
            text,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The fetch capability consumed by the crawl engine
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches `url` once; no retries
    async fn fetch(&self, url: &str) -> Result<Response, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use flymirror::config::FetchConfig;
/// use flymirror::crawler::build_http_client;
///
/// let client = build_http_client(&FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `reqwest`-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Response, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, &e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        if !response.status().is_success() {
            tracing::debug!("{} returned HTTP {}", final_url, status);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, &e))?;

        Ok(Response::new(final_url, status, body.to_vec()))
    }
}

/// Turns a `reqwest` failure into a transport error with a readable reason
fn classify_error(url: &str, error: &reqwest::Error) -> TransportError {
    let reason = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else if error.is_builder() {
        format!("invalid request: {}", error)
    } else {
        error.to_string()
    };

    TransportError {
        url: url.to_string(),
        reason,
    }
}
