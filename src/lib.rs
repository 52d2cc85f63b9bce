//! Flymirror: a tiny, fast, rule-based site mirroring engine
//!
//! Starting from one URL, the engine fetches pages concurrently, decides per
//! response (via an ordered rule list) whether to save the body and which
//! further URLs to extract, and keeps going until no work remains.

pub mod config;
pub mod crawler;
pub mod output;
pub mod rules;
pub mod state;
pub mod template;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Flymirror operations
#[derive(Debug, Error)]
pub enum FlyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid rule pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid template: {0}")]
    Template(#[from] TemplateError),

    #[error("Malformed rule on line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
}

/// Errors raised while interpolating a `{name}` template
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Missing variable '{0}'")]
    MissingVariable(String),

    #[error("Malformed template '{template}': {reason}")]
    Malformed { template: String, reason: String },
}

/// Failure reported by the fetch collaborator for one URL
#[derive(Debug, Clone, Error)]
#[error("Request to {url} failed: {reason}")]
pub struct TransportError {
    pub url: String,
    pub reason: String,
}

/// Reason a single response could not be handled
#[derive(Debug, Error)]
pub enum HandleError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Result type alias for Flymirror operations
pub type Result<T> = std::result::Result<T, FlyError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{load_config, Config, Rule};
pub use crawler::{Engine, EngineHandle, Fetch, HttpFetcher, Outcome, Response};
pub use output::{CrawlEvent, CrawlReport, EventKind};
pub use rules::{Resolution, RuleSet};
pub use state::EngineState;
pub use template::interpolate;
