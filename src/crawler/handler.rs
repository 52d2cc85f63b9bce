//! Response handling
//!
//! For each fetched page the handler picks the first matching rule, saves
//! the body if the rule has a `save_as` template, and turns every match of
//! the rule's `find` pattern into a follow URL through its transform
//! template.

use crate::config::Config;
use crate::crawler::fetcher::Response;
use crate::output::{write_body, EventEmitter, EventKind};
use crate::rules::{named_captures, CompiledRule, Resolution, RuleSet};
use crate::template::{interpolate, Vars};
use crate::{ConfigError, HandleError};
use std::path::PathBuf;

/// Receives follow URLs extracted from a response
pub trait UrlSink: Send + Sync {
    /// Queues `url` for fetching; returns false if it was dropped
    fn enqueue_url(&self, url: String) -> bool;
}

/// Terminal classification of one response
#[derive(Debug)]
pub enum Outcome {
    /// A rule applied and every action succeeded
    Saved {
        /// Where the body was written, if the rule saves
        path: Option<PathBuf>,
        /// Follow URLs handed to the queue
        followed: usize,
    },

    /// No rule matched the URL
    Skipped,

    /// Fetching, saving or link extraction failed
    Failed(HandleError),
}

impl Outcome {
    /// The event kind this outcome is reported as
    pub fn event_kind(&self) -> EventKind {
        match self {
            Self::Saved { .. } => EventKind::Ok,
            Self::Skipped => EventKind::Skip,
            Self::Failed(_) => EventKind::Fail,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Applies the rule list to fetched responses
#[derive(Debug, Clone)]
pub struct ResponseHandler {
    rules: RuleSet,
    vars: Vars,
}

impl ResponseHandler {
    /// Compiles the rule set of `config`
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            rules: RuleSet::compile(&config.rules, &config.vars)?,
            vars: config.vars.clone(),
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Handles one response
    ///
    /// A failed save does not stop link extraction, and a follow URL whose
    /// template cannot be filled is dropped without affecting the others.
    /// Either failure makes the outcome `Failed`, reporting the first error.
    pub async fn handle(
        &self,
        response: &Response,
        sink: &dyn UrlSink,
        events: &EventEmitter,
    ) -> Outcome {
        let (rule, captures) = match self.rules.resolve(&response.request_url) {
            Resolution::Matched { rule, captures, .. } => (rule, captures),
            Resolution::NoMatch => return Outcome::Skipped,
        };

        let mut first_error = None;

        let path = match rule.save_as() {
            Some(template) => match self.save(template, &captures, response, events).await {
                Ok(path) => Some(path),
                Err(e) => {
                    first_error = Some(e);
                    None
                }
            },
            None => None,
        };

        let (followed, link_error) = self.follow(rule, response, sink);
        if first_error.is_none() {
            first_error = link_error;
        }

        match first_error {
            Some(error) => Outcome::Failed(error),
            None => Outcome::Saved { path, followed },
        }
    }

    async fn save(
        &self,
        template: &str,
        captures: &Vars,
        response: &Response,
        events: &EventEmitter,
    ) -> Result<PathBuf, HandleError> {
        let path = PathBuf::from(interpolate(template, &[&self.vars, captures])?);
        events.emit(EventKind::Save, path.display().to_string());

        write_body(&path, &response.body)
            .await
            .map_err(|source| HandleError::Write {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }

    /// Enqueues one follow URL per non-overlapping `find` match
    fn follow(
        &self,
        rule: &CompiledRule,
        response: &Response,
        sink: &dyn UrlSink,
    ) -> (usize, Option<HandleError>) {
        let find = match rule.find_pattern() {
            Some(find) => find,
            None => return (0, None),
        };

        let mut followed = 0;
        let mut first_error = None;

        for caps in find.captures_iter(&response.text) {
            let scope = named_captures(find, &caps);
            match interpolate(rule.transform(), &[&self.vars, &scope]) {
                Ok(url) => {
                    if sink.enqueue_url(url) {
                        followed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Dropping link from {} ({:?}): {}",
                        response.request_url,
                        caps.get(0).map(|m| m.as_str()).unwrap_or_default(),
                        e
                    );
                    if first_error.is_none() {
                        first_error = Some(HandleError::Template(e));
                    }
                }
            }
        }

        (followed, first_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rule;
    use crate::TemplateError;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct CollectingSink {
        urls: Mutex<Vec<String>>,
    }

    impl UrlSink for CollectingSink {
        fn enqueue_url(&self, url: String) -> bool {
            self.urls.lock().unwrap().push(url);
            true
        }
    }

    impl CollectingSink {
        fn urls(&self) -> Vec<String> {
            self.urls.lock().unwrap().clone()
        }
    }

    fn handler(rules: Vec<Rule>) -> ResponseHandler {
        let vars = Vars::from([("host".to_string(), "http://x".to_string())]);
        let config = Config::new(rules, vars, "{host}/Root", 2).unwrap();
        ResponseHandler::new(&config).unwrap()
    }

    const ROOT_BODY: &str = r#"
<a href="/api/Thing/one">followme</a>
<a href="/api/Thing/two">followme</a>
<a href="/nowhere">but not me</a>
"#;

    #[tokio::test]
    async fn test_no_match_is_skipped() {
        let handler = handler(vec![Rule::from_fields("/api/", "false", "false", "false")]);
        let sink = CollectingSink::default();
        let response = Response::new("http://x/other", 200, b"body".to_vec());

        let outcome = handler.handle(&response, &sink, &EventEmitter::new()).await;
        assert!(matches!(outcome, Outcome::Skipped));
        assert_eq!(outcome.event_kind(), EventKind::Skip);
        assert!(sink.urls().is_empty());
    }

    #[tokio::test]
    async fn test_find_and_transform_enqueue_links() {
        let handler = handler(vec![Rule::from_fields(
            "/Root$",
            "false",
            r"/api/Thing/(?<id>\w+)",
            "{host}/api/Thing/{id}",
        )]);
        let sink = CollectingSink::default();
        let response = Response::new("http://x/Root", 200, ROOT_BODY.as_bytes().to_vec());

        let outcome = handler.handle(&response, &sink, &EventEmitter::new()).await;
        match outcome {
            Outcome::Saved { path, followed } => {
                assert_eq!(path, None);
                assert_eq!(followed, 2);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            sink.urls(),
            vec!["http://x/api/Thing/one", "http://x/api/Thing/two"]
        );
    }

    #[tokio::test]
    async fn test_disabled_transform_uses_url_group() {
        let handler = handler(vec![Rule::from_fields(
            "/Root$",
            "false",
            r#"href="(?<url>/api/[^"]+)""#,
            "false",
        )]);
        let sink = CollectingSink::default();
        let response = Response::new("http://x/Root", 200, ROOT_BODY.as_bytes().to_vec());

        handler.handle(&response, &sink, &EventEmitter::new()).await;
        assert_eq!(sink.urls(), vec!["/api/Thing/one", "/api/Thing/two"]);
    }

    #[tokio::test]
    async fn test_save_writes_exact_bytes_and_emits_save() {
        let dir = tempdir().unwrap();
        let mut rules_vars = Vars::new();
        rules_vars.insert("out".to_string(), dir.path().display().to_string());
        let config = Config::new(
            vec![Rule::from_fields(
                r"/api/Thing/(?<id>\w+)",
                "{out}/thing_{id}.txt",
                "false",
                "false",
            )],
            rules_vars,
            "http://x/Root",
            1,
        )
        .unwrap();
        let handler = ResponseHandler::new(&config).unwrap();

        let emitter = EventEmitter::new();
        let mut events = emitter.subscribe();
        let sink = CollectingSink::default();
        let body = vec![0u8, 159, 146, 150, b'z'];
        let response = Response::new("http://x/api/Thing/one", 200, body.clone());

        let outcome = handler.handle(&response, &sink, &emitter).await;
        let expected = dir.path().join("thing_one.txt");
        match outcome {
            Outcome::Saved { path, followed } => {
                assert_eq!(path.as_deref(), Some(expected.as_path()));
                assert_eq!(followed, 0);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(std::fs::read(&expected).unwrap(), body);

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Save);
        assert_eq!(event.detail, expected.display().to_string());
    }

    #[tokio::test]
    async fn test_capture_shadows_config_var_in_save_path() {
        let dir = tempdir().unwrap();
        let vars = Vars::from([
            ("id".to_string(), "from-config".to_string()),
            ("out".to_string(), dir.path().display().to_string()),
        ]);
        let config = Config::new(
            vec![Rule::from_fields(r"/Thing/(?<id>\w+)", "{out}/{id}.txt", "false", "false")],
            vars,
            "http://x/",
            1,
        )
        .unwrap();
        let handler = ResponseHandler::new(&config).unwrap();
        let response = Response::new("http://x/Thing/captured", 200, b"c".to_vec());

        handler
            .handle(&response, &CollectingSink::default(), &EventEmitter::new())
            .await;
        assert!(dir.path().join("captured.txt").exists());
        assert!(!dir.path().join("from-config.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_variable_in_save_path_fails() {
        let handler = handler(vec![Rule::from_fields("/Root", "{nowhere}.txt", "false", "false")]);
        let response = Response::new("http://x/Root", 200, b"x".to_vec());

        let outcome = handler
            .handle(&response, &CollectingSink::default(), &EventEmitter::new())
            .await;
        match outcome {
            Outcome::Failed(HandleError::Template(TemplateError::MissingVariable(name))) => {
                assert_eq!(name, "nowhere")
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_failure_still_follows_links() {
        let dir = tempdir().unwrap();
        let vars = Vars::from([("dir".to_string(), dir.path().display().to_string())]);
        // Saving onto an existing directory cannot succeed
        let config = Config::new(
            vec![Rule::from_fields(
                "/Root",
                "{dir}",
                r"/api/Thing/(?<id>\w+)",
                "http://x/api/Thing/{id}",
            )],
            vars,
            "http://x/Root",
            1,
        )
        .unwrap();
        let handler = ResponseHandler::new(&config).unwrap();
        let sink = CollectingSink::default();
        let response = Response::new("http://x/Root", 200, ROOT_BODY.as_bytes().to_vec());

        let outcome = handler.handle(&response, &sink, &EventEmitter::new()).await;
        assert!(matches!(outcome, Outcome::Failed(HandleError::Write { .. })));
        assert_eq!(sink.urls().len(), 2);
    }

    #[tokio::test]
    async fn test_unfillable_transform_drops_links() {
        let handler = handler(vec![Rule::from_fields(
            "/Root",
            "false",
            r"/api/Thing/(?<id>\w+)",
            "{host}/api/Thing/{missing}",
        )]);
        let sink = CollectingSink::default();
        let response = Response::new("http://x/Root", 200, ROOT_BODY.as_bytes().to_vec());

        let outcome = handler.handle(&response, &sink, &EventEmitter::new()).await;
        match outcome {
            Outcome::Failed(HandleError::Template(TemplateError::MissingVariable(name))) => {
                assert_eq!(name, "missing")
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(sink.urls().is_empty());
    }

    #[tokio::test]
    async fn test_unmatched_optional_group_still_yields_link() {
        let handler = handler(vec![Rule::from_fields(
            "/Root",
            "false",
            r#"href="/(?:api/Thing/(?<id>\w+)|nowhere)""#,
            "{host}/api/Thing/{id}",
        )]);
        let sink = CollectingSink::default();
        let response = Response::new("http://x/Root", 200, ROOT_BODY.as_bytes().to_vec());

        let outcome = handler.handle(&response, &sink, &EventEmitter::new()).await;
        assert!(!outcome.is_failure());
        assert_eq!(
            sink.urls(),
            vec![
                "http://x/api/Thing/one",
                "http://x/api/Thing/two",
                "http://x/api/Thing/"
            ]
        );
    }
}
