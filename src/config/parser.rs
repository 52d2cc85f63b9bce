use crate::config::types::{Config, FetchConfig, RawConfig, Rule, DEFAULT_WORKERS};
use crate::template::Vars;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Number of fields in a tab-separated rule row
const RULE_FIELDS: usize = 4;

/// Loads and parses a configuration file from the given path
///
/// Files with a `.toml` extension are read as TOML; anything else is read as
/// a tab-separated rules file.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use flymirror::config::load_config;
///
/// let config = load_config(Path::new("mirror.toml")).unwrap();
/// println!("Starting at: {}", config.start);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    if is_toml {
        parse_toml(&content)
    } else {
        parse_rules_file(&content)
    }
}

/// Parses a TOML configuration
pub fn parse_toml(content: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(content)?;
    Config::try_from(raw)
}

/// Parses a tab-separated rules file
///
/// The first line holds `key=value` settings (`start`, `workers`,
/// `user-agent`, `timeout-secs`). After that:
/// - blank lines, the `URLMATCH` header and lines whose first field contains
///   `DISCARD` are ignored
/// - a line starting with `VARS` adds `key=value` variables
/// - every other line is a rule of four non-empty fields:
///   url match, save as, find, transform
pub fn parse_rules_file(content: &str) -> Result<Config, ConfigError> {
    let mut lines = content.lines().enumerate();

    let mut settings = Vars::new();
    if let Some((_, header)) = lines.next() {
        read_declarations(&split_fields(header), &mut settings);
    }

    let mut vars = Vars::new();
    let mut rules = Vec::new();

    for (index, line) in lines {
        let fields = split_fields(line);
        let first = match fields.first() {
            Some(first) => *first,
            None => continue,
        };

        if fields.iter().all(|f| f.is_empty()) || first == "URLMATCH" || first.contains("DISCARD")
        {
            continue;
        }

        if first == "VARS" {
            read_declarations(&fields, &mut vars);
            continue;
        }

        let values: Vec<&str> = fields.into_iter().filter(|f| !f.is_empty()).collect();
        if values.len() != RULE_FIELDS {
            return Err(ConfigError::MalformedRow {
                line: index + 1,
                reason: format!(
                    "expected {} fields (url match, save as, find, transform), found {}",
                    RULE_FIELDS,
                    values.len()
                ),
            });
        }

        rules.push(Rule::from_fields(values[0], values[1], values[2], values[3]));
    }

    let start = settings
        .remove("start")
        .ok_or_else(|| ConfigError::Validation("missing start=<url> on the first line".to_string()))?;

    let workers = match settings.remove("workers") {
        Some(value) => value.trim().parse::<usize>().map_err(|e| {
            ConfigError::Validation(format!("workers must be a positive integer, got '{}': {}", value, e))
        })?,
        None => DEFAULT_WORKERS,
    };

    let mut fetch = FetchConfig::default();
    if let Some(user_agent) = settings.remove("user-agent") {
        fetch.user_agent = user_agent;
    }
    if let Some(value) = settings.remove("timeout-secs") {
        fetch.timeout_secs = value.trim().parse::<u64>().map_err(|e| {
            ConfigError::Validation(format!("timeout-secs must be an integer, got '{}': {}", value, e))
        })?;
    }

    if let Some(unknown) = settings.keys().next() {
        return Err(ConfigError::Validation(format!(
            "unknown setting '{}' on the first line",
            unknown
        )));
    }

    Config::with_fetch(rules, vars, &start, workers, fetch)
}

/// Splits a line on tabs, skipping leading spaces in each field
fn split_fields(line: &str) -> Vec<&str> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() {
        return Vec::new();
    }
    line.split('\t').map(|f| f.trim_start_matches(' ')).collect()
}

/// Reads every `key=value` field of a line into `map`
fn read_declarations(fields: &[&str], map: &mut Vars) {
    for field in fields {
        if let Some((name, value)) = field.split_once('=') {
            map.insert(name.to_string(), value.to_string());
        }
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs can be tied to the exact rules they used.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn create_temp_config(content: &str, suffix: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const SAMPLE_TSV: &str = "start={host}/api/Root\tworkers=3\n\
VARS\thost=http://example.com\n\
URLMATCH\tSAVEAS\tFIND\tTRANSFORM\n\
\n\
/api/Root\tfalse\t\t/api/Thing/(?P<id>\\w+)\t{host}/api/Thing/{id}\n\
/api/Thing/(?P<id>\\w+)\tfalse\t/api/dl/(?P<file>\\w+)\\.zip\t{host}/api/dl/{file}.zip\n\
DISCARD\tthis row\tis\tignored\n\
/api/dl/(?P<name>\\w+)\\.zip\ttest_{name}.txt\tfalse\tfalse\n";

    #[test]
    fn test_parse_rules_file() {
        let config = parse_rules_file(SAMPLE_TSV).unwrap();

        assert_eq!(config.start, "http://example.com/api/Root");
        assert_eq!(config.workers, 3);
        assert_eq!(config.vars.get("host").unwrap(), "http://example.com");
        assert_eq!(config.rules.len(), 3);

        // Padding tabs are dropped
        assert_eq!(config.rules[0].url_match, "/api/Root");
        assert_eq!(config.rules[0].save_as, None);
        assert_eq!(config.rules[0].find.as_deref(), Some("/api/Thing/(?P<id>\\w+)"));

        assert_eq!(config.rules[2].save_as.as_deref(), Some("test_{name}.txt"));
        assert_eq!(config.rules[2].effective_transform(), "{url}");
    }

    #[test]
    fn test_rules_file_default_workers() {
        let config = parse_rules_file("start=http://x/\n/\tfalse\tfalse\tfalse\n").unwrap();
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn test_rules_file_rejects_short_row() {
        let result = parse_rules_file("start=http://x/\n/\tfalse\tfalse\n");
        match result {
            Err(ConfigError::MalformedRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected MalformedRow, got {:?}", other),
        }
    }

    #[test]
    fn test_rules_file_requires_start() {
        let result = parse_rules_file("workers=2\n/\tfalse\tfalse\tfalse\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rules_file_rejects_unknown_setting() {
        let result = parse_rules_file("start=http://x/\tcolour=blue\n");
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_toml_config() {
        let config_content = r#"
start = "{host}/Root"
workers = 4
user-agent = "TestMirror/1.0"

[vars]
host = "http://x"

[[rules]]
url-match = "/Root$"
save-as = false
find = '/api/Thing/(?<id>\w+)'
transform = "{host}/api/Thing/{id}"

[[rules]]
url-match = '/api/Thing/(?<id>\w+)'
save-as = "thing_{id}.txt"
"#;

        let file = create_temp_config(config_content, ".toml");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.start, "http://x/Root");
        assert_eq!(config.workers, 4);
        assert_eq!(config.fetch.user_agent, "TestMirror/1.0");
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].save_as, None);
        assert_eq!(config.rules[1].find, None);
        assert_eq!(config.rules[1].transform, None);
    }

    #[test]
    fn test_load_rules_file_by_extension() {
        let file = create_temp_config(SAMPLE_TSV, ".tsv");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rules.len(), 3);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/rules.tsv"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{", ".toml");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
start = "http://x/"
workers = 0
"#;
        let file = create_temp_config(config_content, ".toml");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content", ".tsv");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1", ".tsv");
        let file2 = create_temp_config("content 2", ".tsv");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
