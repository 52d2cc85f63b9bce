use crate::config::types::Config;
use crate::rules::RuleSet;
use crate::template::{placeholders, Vars};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Upper bound on the worker pool size
pub const MAX_WORKERS: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_workers(config.workers)?;
    validate_start_url(&config.start)?;
    validate_rules(config)?;
    Ok(())
}

/// Validates the worker count
fn validate_workers(workers: usize) -> Result<(), ConfigError> {
    if !(1..=MAX_WORKERS).contains(&workers) {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, workers
        )));
    }
    Ok(())
}

/// Validates the (already interpolated) start URL
fn validate_start_url(start: &str) -> Result<(), ConfigError> {
    let url = Url::parse(start)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", start, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Start URL '{}' must use http or https",
            start
        )));
    }

    Ok(())
}

/// Validates every rule: patterns must compile and templates must parse
///
/// Placeholders that no variable or named group could ever bind are only
/// warned about; they surface at runtime as a missing variable.
fn validate_rules(config: &Config) -> Result<(), ConfigError> {
    if config.rules.is_empty() {
        tracing::warn!("No rules configured; every response will be skipped");
    }

    for (index, rule) in config.rules.iter().enumerate() {
        if rule.url_match.is_empty() {
            return Err(ConfigError::Validation(format!(
                "rule {} has an empty url match",
                index + 1
            )));
        }
    }

    let rule_set = RuleSet::compile(&config.rules, &config.vars)?;

    for (index, compiled) in rule_set.iter().enumerate() {
        let rule = compiled.rule();

        if let Some(save_as) = &rule.save_as {
            warn_unbound(index, "save-as", save_as, &config.vars, compiled.url_pattern())?;
        }

        match compiled.find_pattern() {
            Some(find) => {
                warn_unbound(index, "transform", rule.effective_transform(), &config.vars, find)?;
            }
            None => {
                // Transform is unused without find, but must still parse
                if let Some(transform) = &rule.transform {
                    placeholders(transform)?;
                }
            }
        }
    }

    Ok(())
}

fn warn_unbound(
    index: usize,
    field: &str,
    template: &str,
    vars: &Vars,
    pattern: &Regex,
) -> Result<(), ConfigError> {
    for name in placeholders(template)? {
        let bound = vars.contains_key(name) || pattern.capture_names().flatten().any(|n| n == name);
        if !bound {
            tracing::warn!(
                "Rule {} {} references '{{{}}}', which is neither a variable nor a named group of '{}'",
                index + 1,
                field,
                name,
                pattern.as_str()
            );
        }
    }
    Ok(())
}
