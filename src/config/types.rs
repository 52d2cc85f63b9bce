use crate::config::validation::validate;
use crate::template::{interpolate, Vars};
use crate::ConfigError;
use serde::Deserialize;

/// Sentinel used in rule files to switch an action off
pub const DISABLED: &str = "false";

/// Transform template used when a rule does not provide one
pub const DEFAULT_TRANSFORM: &str = "{url}";

/// Default number of workers when the config does not set one
pub const DEFAULT_WORKERS: usize = 5;

/// Default per-request timeout for the HTTP fetcher (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A single mirroring rule
///
/// Rules are tried in declaration order against each fetched URL and the
/// first whose `url_match` pattern matches is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Regex searched for in the fetched URL; may contain `{var}` placeholders
    pub url_match: String,

    /// Path template to save the body to, `None` to skip saving
    pub save_as: Option<String>,

    /// Regex whose matches in the body produce follow URLs, `None` to skip
    pub find: Option<String>,

    /// Template turning a `find` match into a URL, `None` for `{url}`
    pub transform: Option<String>,
}

impl Rule {
    /// Builds a rule from its four textual fields, honouring the `"false"` sentinel
    pub fn from_fields(url_match: &str, save_as: &str, find: &str, transform: &str) -> Self {
        Self {
            url_match: url_match.to_string(),
            save_as: optional_field(save_as),
            find: optional_field(find),
            transform: optional_field(transform),
        }
    }

    /// Returns the transform template actually used for follow URLs
    ///
    /// A disabled (or empty) transform does not disable link following; it
    /// falls back to [`DEFAULT_TRANSFORM`].
    pub fn effective_transform(&self) -> &str {
        match self.transform.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => DEFAULT_TRANSFORM,
        }
    }
}

fn optional_field(value: &str) -> Option<String> {
    if value == DISABLED {
        None
    } else {
        Some(value.to_string())
    }
}

/// HTTP fetcher settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("flymirror/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Main configuration structure for Flymirror
#[derive(Debug, Clone)]
pub struct Config {
    /// Ordered rule list; first match wins
    pub rules: Vec<Rule>,

    /// Named variables available to every template
    pub vars: Vars,

    /// Seed URL, already interpolated against `vars`
    pub start: String,

    /// Size of the worker pool
    pub workers: usize,

    /// Fetcher settings
    pub fetch: FetchConfig,
}

impl Config {
    /// Builds and validates a configuration
    ///
    /// `start` may reference `vars`; it is interpolated here.
    pub fn new(rules: Vec<Rule>, vars: Vars, start: &str, workers: usize) -> Result<Self, ConfigError> {
        Self::with_fetch(rules, vars, start, workers, FetchConfig::default())
    }

    /// Like [`Config::new`] with explicit fetcher settings
    pub fn with_fetch(
        rules: Vec<Rule>,
        vars: Vars,
        start: &str,
        workers: usize,
        fetch: FetchConfig,
    ) -> Result<Self, ConfigError> {
        let start = interpolate(start, &[&vars])?;
        let config = Self {
            rules,
            vars,
            start,
            workers,
            fetch,
        };
        validate(&config)?;
        Ok(config)
    }
}

/// A rule field as written in TOML: a template string or `false`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Flag(bool),
    Text(String),
}

impl Default for RawField {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl RawField {
    pub(crate) fn into_field(self, name: &str) -> Result<Option<String>, ConfigError> {
        match self {
            Self::Flag(false) => Ok(None),
            Self::Flag(true) => Err(ConfigError::Validation(format!(
                "{} must be a template or false, got true",
                name
            ))),
            Self::Text(text) => Ok(optional_field(&text)),
        }
    }
}

/// Rule as deserialised from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawRule {
    #[serde(rename = "url-match")]
    pub url_match: String,

    #[serde(rename = "save-as", default)]
    pub save_as: RawField,

    #[serde(default)]
    pub find: RawField,

    #[serde(default)]
    pub transform: RawField,
}

/// Configuration as deserialised from TOML, before interpolation and validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    pub start: String,

    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,

    #[serde(rename = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub vars: Vars,

    #[serde(default)]
    pub rules: Vec<RawRule>,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let rules = raw
            .rules
            .into_iter()
            .map(|r| {
                Ok(Rule {
                    url_match: r.url_match,
                    save_as: r.save_as.into_field("save-as")?,
                    find: r.find.into_field("find")?,
                    transform: r.transform.into_field("transform")?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut fetch = FetchConfig::default();
        if let Some(user_agent) = raw.user_agent {
            fetch.user_agent = user_agent;
        }
        if let Some(timeout_secs) = raw.timeout_secs {
            fetch.timeout_secs = timeout_secs;
        }

        Config::with_fetch(rules, raw.vars, &raw.start, raw.workers, fetch)
    }
}
