//! Rule resolution
//!
//! Given a fetched URL, the resolver walks the rule list in declaration order
//! and picks the first rule whose `url_match` pattern (interpolated against
//! the config variables) is found anywhere in the URL. The named groups of
//! that match become the capture scope for the rule's `save_as` template.
//!
//! A URL that matches no rule is not an error: it resolves to
//! [`Resolution::NoMatch`] and the response is skipped.

use crate::config::Rule;
use crate::template::{interpolate, Vars};
use crate::ConfigError;
use regex::{Captures, Regex};

/// Outcome of resolving a URL against an ordered rule list
#[derive(Debug)]
pub enum Resolution<'a, R> {
    /// The first rule, in declaration order, whose pattern matched
    Matched {
        /// Position of the rule in the list
        index: usize,
        /// The matching rule
        rule: &'a R,
        /// Named groups of the URL match
        captures: Vars,
    },

    /// No rule applies to the URL
    NoMatch,
}

impl<'a, R> Resolution<'a, R> {
    /// Returns true if a rule matched
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }

    /// Returns the index of the matched rule, if any
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Matched { index, .. } => Some(*index),
            Self::NoMatch => None,
        }
    }
}

/// A rule with its patterns interpolated and compiled
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    url_match: Regex,
    find: Option<Regex>,
}

impl CompiledRule {
    /// Interpolates `url_match` against `vars` and compiles both patterns
    pub fn compile(rule: &Rule, vars: &Vars) -> Result<Self, ConfigError> {
        let url_match = compile_url_match(rule, vars)?;
        let find = rule
            .find
            .as_deref()
            .map(|pattern| compile_pattern(pattern, "find"))
            .transpose()?;

        Ok(Self {
            rule: rule.clone(),
            url_match,
            find,
        })
    }

    /// The rule as configured
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// The compiled, interpolated URL pattern
    pub fn url_pattern(&self) -> &Regex {
        &self.url_match
    }

    /// The compiled link extraction pattern, if link following is enabled
    pub fn find_pattern(&self) -> Option<&Regex> {
        self.find.as_ref()
    }

    /// The save path template, if saving is enabled
    pub fn save_as(&self) -> Option<&str> {
        self.rule.save_as.as_deref()
    }

    /// The transform template used for follow URLs
    pub fn transform(&self) -> &str {
        self.rule.effective_transform()
    }
}

/// An ordered, precompiled rule list
///
/// Config variables never change during a run, so every pattern is
/// interpolated and compiled once up front.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compiles every rule, failing on the first invalid pattern
    pub fn compile(rules: &[Rule], vars: &Vars) -> Result<Self, ConfigError> {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule::compile(rule, vars))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Finds the first rule matching `url`
    pub fn resolve(&self, url: &str) -> Resolution<'_, CompiledRule> {
        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(caps) = rule.url_match.captures(url) {
                return Resolution::Matched {
                    index,
                    rule,
                    captures: named_captures(&rule.url_match, &caps),
                };
            }
        }
        Resolution::NoMatch
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Resolves `url` against uncompiled rules
///
/// Each rule's pattern is interpolated and compiled only when it is reached,
/// so an invalid pattern after the first match is never looked at.
///
/// # Example
///
/// ```
/// use flymirror::config::Rule;
/// use flymirror::rules::{resolve, Resolution};
/// use flymirror::template::Vars;
///
/// let rules = vec![
///     Rule::from_fields("/nowhere", "false", "false", "false"),
///     Rule::from_fields(r"/api/Thing/(?<id>\w+)", "thing_{id}.txt", "false", "false"),
/// ];
///
/// match resolve("http://x/api/Thing/one", &rules, &Vars::new()).unwrap() {
///     Resolution::Matched { index, captures, .. } => {
///         assert_eq!(index, 1);
///         assert_eq!(captures["id"], "one");
///     }
///     Resolution::NoMatch => unreachable!(),
/// }
/// ```
pub fn resolve<'a>(
    url: &str,
    rules: &'a [Rule],
    vars: &Vars,
) -> Result<Resolution<'a, Rule>, ConfigError> {
    for (index, rule) in rules.iter().enumerate() {
        let pattern = compile_url_match(rule, vars)?;
        if let Some(caps) = pattern.captures(url) {
            return Ok(Resolution::Matched {
                index,
                rule,
                captures: named_captures(&pattern, &caps),
            });
        }
    }
    Ok(Resolution::NoMatch)
}

/// Collects the named groups of a match
///
/// Optional groups that did not participate bind to the empty string, so
/// they still shadow a config variable of the same name.
pub fn named_captures(pattern: &Regex, caps: &Captures<'_>) -> Vars {
    pattern
        .capture_names()
        .flatten()
        .map(|name| {
            let value = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
            (name.to_string(), value.to_string())
        })
        .collect()
}

fn compile_url_match(rule: &Rule, vars: &Vars) -> Result<Regex, ConfigError> {
    let pattern = interpolate(&rule.url_match, &[vars])?;
    compile_pattern(&pattern, "url match")
}

fn compile_pattern(pattern: &str, field: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern)
        .map_err(|e| ConfigError::InvalidPattern(format!("{} '{}': {}", field, pattern, e)))
}
