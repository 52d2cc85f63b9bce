//! Template interpolation
//!
//! Templates are plain strings containing `{name}` placeholders. Each
//! placeholder is replaced with the value bound to `name` in a layered set of
//! variable scopes, where later scopes shadow earlier ones. Doubled braces
//! (`{{` and `}}`) emit a literal brace; no other syntax is recognised.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use flymirror::template::interpolate;
//!
//! let vars = HashMap::from([("host".to_string(), "http://x".to_string())]);
//! let captures = HashMap::from([("id".to_string(), "one".to_string())]);
//!
//! let url = interpolate("{host}/api/Thing/{id}", &[&vars, &captures]).unwrap();
//! assert_eq!(url, "http://x/api/Thing/one");
//! ```

use crate::TemplateError;
use std::collections::HashMap;

/// A single layer of interpolation variables
pub type Vars = HashMap<String, String>;

/// A parsed piece of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text copied to the output as-is
    Literal(&'a str),

    /// A `{name}` reference to be looked up in the scopes
    Placeholder(&'a str),
}

/// Splits a template into literal text and placeholders
///
/// # Errors
///
/// Returns `TemplateError::Malformed` for an unterminated `{`, a single `}`,
/// an empty `{}` or a `{` nested inside a placeholder.
pub fn parse(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find(|c: char| c == '{' || c == '}') {
        if pos > 0 {
            segments.push(Segment::Literal(&rest[..pos]));
        }

        let brace = rest.as_bytes()[pos];
        let after = &rest[pos + 1..];

        // Doubled brace is an escaped literal
        if after.as_bytes().first() == Some(&brace) {
            segments.push(Segment::Literal(&rest[pos..pos + 1]));
            rest = &after[1..];
            continue;
        }

        if brace == b'}' {
            return Err(malformed(template, "single '}' encountered"));
        }

        match after.find(|c: char| c == '{' || c == '}') {
            Some(end) if after.as_bytes()[end] == b'}' => {
                let name = &after[..end];
                if name.is_empty() {
                    return Err(malformed(template, "empty placeholder '{}'"));
                }
                segments.push(Segment::Placeholder(name));
                rest = &after[end + 1..];
            }
            Some(_) => return Err(malformed(template, "unexpected '{' in placeholder")),
            None => return Err(malformed(template, "unterminated '{'")),
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }

    Ok(segments)
}

/// Returns the placeholder names referenced by a template, in order
pub fn placeholders(template: &str) -> Result<Vec<&str>, TemplateError> {
    Ok(parse(template)?
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect())
}

/// Interpolates `template` against the given scopes
///
/// Scopes are searched from last to first, so a name bound in a later scope
/// shadows the same name in an earlier one.
///
/// # Errors
///
/// * `TemplateError::MissingVariable` - a placeholder is bound in no scope
/// * `TemplateError::Malformed` - the template itself does not parse
pub fn interpolate(template: &str, scopes: &[&Vars]) -> Result<String, TemplateError> {
    let mut output = String::with_capacity(template.len());

    for segment in parse(template)? {
        match segment {
            Segment::Literal(text) => output.push_str(text),
            Segment::Placeholder(name) => {
                let value = lookup(name, scopes)
                    .ok_or_else(|| TemplateError::MissingVariable(name.to_string()))?;
                output.push_str(value);
            }
        }
    }

    Ok(output)
}

fn lookup<'a>(name: &str, scopes: &[&'a Vars]) -> Option<&'a str> {
    scopes
        .iter()
        .rev()
        .find_map(|scope| scope.get(name))
        .map(String::as_str)
}

fn malformed(template: &str, reason: &str) -> TemplateError {
    TemplateError::Malformed {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_template_without_placeholders_is_unchanged() {
        let scope = vars(&[("a", "1")]);
        for template in ["", "plain text", "http://x/api/Root", "thing.txt"] {
            assert_eq!(interpolate(template, &[&scope]).unwrap(), template);
        }
    }

    #[test]
    fn test_simple_substitution() {
        let scope = vars(&[("id", "one"), ("ext", "txt")]);
        assert_eq!(
            interpolate("thing_{id}.{ext}", &[&scope]).unwrap(),
            "thing_one.txt"
        );
    }

    #[test]
    fn test_later_scope_shadows_earlier() {
        let config_vars = vars(&[("id", "from-config"), ("host", "http://x")]);
        let captures = vars(&[("id", "from-capture")]);

        assert_eq!(
            interpolate("{host}/{id}", &[&config_vars, &captures]).unwrap(),
            "http://x/from-capture"
        );
    }

    #[test]
    fn test_missing_variable() {
        let scope = vars(&[("a", "1")]);
        assert_eq!(
            interpolate("{a}/{b}", &[&scope]),
            Err(TemplateError::MissingVariable("b".to_string()))
        );
        assert_eq!(
            interpolate("{a}", &[]),
            Err(TemplateError::MissingVariable("a".to_string()))
        );
    }

    #[test]
    fn test_doubled_braces_are_literal() {
        let scope = vars(&[("n", "3")]);
        assert_eq!(
            interpolate(r"\d{{{n}}}", &[&scope]).unwrap(),
            r"\d{3}"
        );
        assert_eq!(interpolate("{{}}", &[]).unwrap(), "{}");
    }

    #[test]
    fn test_malformed_templates() {
        for template in ["{unterminated", "stray } brace", "{}", "{a{b}}"] {
            assert!(
                matches!(
                    interpolate(template, &[]),
                    Err(TemplateError::Malformed { .. })
                ),
                "expected {:?} to be malformed",
                template
            );
        }
    }

    #[test]
    fn test_placeholders_in_order() {
        assert_eq!(
            placeholders("{host}/x/{id}/{host}").unwrap(),
            vec!["host", "id", "host"]
        );
        assert!(placeholders("no placeholders {{here}}").unwrap().is_empty());
    }

    #[test]
    fn test_unicode_literals_survive() {
        let scope = vars(&[("name", "ünï")]);
        assert_eq!(
            interpolate("→ {name} ←", &[&scope]).unwrap(),
            "→ ünï ←"
        );
    }
}
