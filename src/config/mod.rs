//! Configuration module for Flymirror
//!
//! This module loads, parses, and validates rule files. Two formats are
//! accepted: TOML (`*.toml`) and the tab-separated rules format.
//!
//! # Example
//!
//! ```no_run
//! use flymirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("rules.tsv")).unwrap();
//! println!("Mirror will start at: {}", config.start);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, RawConfig, RawField, RawRule, Rule, DEFAULT_TIMEOUT_SECS,
    DEFAULT_TRANSFORM, DEFAULT_WORKERS, DISABLED,
};
pub use validation::MAX_WORKERS;

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_rules_file, parse_toml,
};
