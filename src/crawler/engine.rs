//! Crawl engine - the concurrent producer/consumer core
//!
//! The engine owns two unbounded queues (URLs to fetch, responses to
//! handle), a fixed pool of workers, and one dispatch loop per queue that
//! hands items to the pool. Fetch tasks push responses; response tasks push
//! follow URLs. The crawl ends when the in-flight counters for both queues
//! are zero at the same time, or when an operator calls
//! [`EngineHandle::stop`].
//!
//! ```text
//! seed -> URL queue -> fetch task -> response queue -> response task
//!            ^                                             |
//!            +---------------- follow URLs ----------------+
//! ```

use crate::config::Config;
use crate::crawler::fetcher::{Fetch, HttpFetcher, Response};
use crate::crawler::handler::{Outcome, ResponseHandler, UrlSink};
use crate::crawler::tracker::{InFlight, InFlightCounts};
use crate::output::{CrawlEvent, CrawlReport, CrawlStats, EventEmitter, EventKind};
use crate::state::EngineState;
use crate::{FlyError, TransportError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Result of one fetch, queued for response handling
#[derive(Debug)]
pub struct Fetched {
    /// URL as it was queued
    pub url: String,
    pub result: Result<Response, TransportError>,
}

/// Unit of work for the pool
enum Job {
    Fetch(String),
    Handle(Fetched),
}

/// State shared between the engine, its handles and its workers
struct Shared {
    start: String,
    workers: usize,
    handler: ResponseHandler,
    fetcher: Arc<dyn Fetch>,
    urls: UnboundedSender<String>,
    responses: UnboundedSender<Fetched>,
    in_flight: InFlight,
    state: AtomicU8,
    stop: watch::Sender<bool>,
    events: EventEmitter,
    stats: CrawlStats,
}

/// A single crawl run
///
/// # Example
///
/// ```no_run
/// use flymirror::config::load_config;
/// use flymirror::crawler::Engine;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("rules.tsv"))?;
/// let engine = Engine::with_http(config)?;
/// let report = engine.run().await;
/// println!("fetched {} pages", report.fetched);
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    shared: Arc<Shared>,
    url_rx: UnboundedReceiver<String>,
    response_rx: UnboundedReceiver<Fetched>,
}

/// Cloneable control handle for a running (or not yet started) engine
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Shared>,
}

impl Engine {
    /// Creates an engine for `config` using the given fetch capability
    ///
    /// Fails if a rule pattern cannot be compiled.
    pub fn new(config: Config, fetcher: Arc<dyn Fetch>) -> Result<Self, FlyError> {
        let handler = ResponseHandler::new(&config)?;
        let (urls, url_rx) = mpsc::unbounded_channel();
        let (responses, response_rx) = mpsc::unbounded_channel();
        let (stop, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            start: config.start,
            workers: config.workers.max(1),
            handler,
            fetcher,
            urls,
            responses,
            in_flight: InFlight::new(),
            state: AtomicU8::new(EngineState::Running as u8),
            stop,
            events: EventEmitter::new(),
            stats: CrawlStats::new(),
        });

        Ok(Self {
            shared,
            url_rx,
            response_rx,
        })
    }

    /// Creates an engine that fetches over HTTP with `config.fetch` settings
    pub fn with_http(config: Config) -> Result<Self, FlyError> {
        let fetcher = HttpFetcher::new(&config.fetch)?;
        Self::new(config, Arc::new(fetcher))
    }

    /// Subscribes to the event stream of this run
    pub fn subscribe(&self) -> UnboundedReceiver<CrawlEvent> {
        self.shared.events.subscribe()
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs the crawl until the work drains or the engine is stopped
    ///
    /// In-flight tasks are allowed to finish before this returns.
    pub async fn run(self) -> CrawlReport {
        let Engine {
            shared,
            url_rx,
            response_rx,
        } = self;
        let started = Instant::now();

        shared.events.emit(EventKind::Start, shared.start.as_str());
        tracing::info!("Starting crawl at {} with {} workers", shared.start, shared.workers);
        shared.enqueue_url(shared.start.clone());

        // Bounded: a dispatcher waits here until a worker is free
        let (job_tx, job_rx) = mpsc::channel::<Job>(shared.workers);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let workers: Vec<JoinHandle<()>> = (0..shared.workers)
            .map(|id| tokio::spawn(worker_loop(id, Arc::clone(&shared), Arc::clone(&job_rx))))
            .collect();

        let url_dispatcher = tokio::spawn(dispatch_loop(
            "url",
            url_rx,
            job_tx.clone(),
            Job::Fetch,
            shared.stop.subscribe(),
        ));
        let response_dispatcher = tokio::spawn(dispatch_loop(
            "response",
            response_rx,
            job_tx,
            Job::Handle,
            shared.stop.subscribe(),
        ));

        let mut stop_rx = shared.stop.subscribe();
        tokio::select! {
            _ = shared.in_flight.wait_idle() => {
                if shared.transition(EngineState::Draining) {
                    tracing::debug!("Queues drained, shutting down");
                }
            }
            _ = wait_for_stop(&mut stop_rx) => {
                tracing::info!("Stop requested, finishing in-flight work");
            }
        }

        shared.stop();

        for dispatcher in [url_dispatcher, response_dispatcher] {
            if let Err(e) = dispatcher.await {
                tracing::error!("Dispatch loop panicked: {}", e);
            }
        }
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("Worker panicked: {}", e);
            }
        }

        let report = shared.stats.snapshot(started.elapsed());
        shared.events.emit(EventKind::End, "");
        tracing::info!(
            "Crawl finished: {} fetched, {} ok, {} skipped, {} failed in {:?}",
            report.fetched,
            report.saved,
            report.skipped,
            report.failed,
            report.elapsed
        );
        report
    }
}

impl EngineHandle {
    /// Queues a URL; dropped silently once the engine has stopped
    pub fn enqueue_url(&self, url: impl Into<String>) -> bool {
        self.shared.enqueue_url(url.into())
    }

    /// Broadcasts the stop signal
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Outstanding URL and response tasks
    pub fn in_flight(&self) -> InFlightCounts {
        self.shared.in_flight.counts()
    }
}

impl UrlSink for EngineHandle {
    fn enqueue_url(&self, url: String) -> bool {
        self.shared.enqueue_url(url)
    }
}

impl Shared {
    fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_stopped(&self) -> bool {
        self.state().is_terminal()
    }

    /// Moves to `next` if legal from the current state
    fn transition(&self, next: EngineState) -> bool {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if !EngineState::from_u8(current).can_transition_to(next) {
                return false;
            }
            match self.state.compare_exchange(
                current,
                next as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn stop(&self) {
        if self.transition(EngineState::Stopped) {
            tracing::debug!("Engine stopped");
        }
        self.stop.send_replace(true);
    }

    fn enqueue_response(&self, fetched: Fetched) {
        self.in_flight.response_queued();
        if let Err(e) = self.responses.send(fetched) {
            tracing::debug!("Response queue closed, dropping {}", e.0.url);
            self.in_flight.response_completed();
        }
    }

    async fn fetch_task(&self, url: String) {
        let _task = self.in_flight.url_task();

        self.events.emit(EventKind::Get, url.as_str());
        self.stats.record_fetch();

        let result = self.fetcher.fetch(&url).await;
        if result.is_err() {
            self.stats.record_transport_error();
        }

        // Queued before the URL slot is released by `_task`
        self.enqueue_response(Fetched { url, result });
    }

    async fn response_task(&self, fetched: Fetched) {
        let _task = self.in_flight.response_task();

        let (url, outcome) = match fetched.result {
            Ok(response) => {
                let outcome = self.handler.handle(&response, self, &self.events).await;
                (response.request_url, outcome)
            }
            Err(e) => (fetched.url, Outcome::Failed(e.into())),
        };

        match &outcome {
            Outcome::Saved { .. } => {
                self.stats.record_saved();
                self.events.emit(EventKind::Ok, url);
            }
            Outcome::Skipped => {
                self.stats.record_skipped();
                self.events.emit(EventKind::Skip, url);
            }
            Outcome::Failed(reason) => {
                self.stats.record_failed();
                self.events.emit(EventKind::Fail, format!("{} {}", url, reason));
            }
        }
    }
}

impl UrlSink for Shared {
    fn enqueue_url(&self, url: String) -> bool {
        if self.is_stopped() {
            tracing::trace!("Engine stopped, dropping {}", url);
            self.stats.record_dropped();
            return false;
        }

        self.in_flight.url_queued();
        if let Err(e) = self.urls.send(url) {
            tracing::debug!("URL queue closed, dropping {}", e.0);
            self.in_flight.url_completed();
            self.stats.record_dropped();
            return false;
        }

        self.stats.record_enqueued();
        true
    }
}

/// Moves items from one queue into the worker pool until stopped
async fn dispatch_loop<T>(
    name: &'static str,
    mut queue: UnboundedReceiver<T>,
    jobs: mpsc::Sender<Job>,
    into_job: fn(T) -> Job,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let item = tokio::select! {
            biased;
            _ = wait_for_stop(&mut stop) => break,
            item = queue.recv() => item,
        };

        let Some(item) = item else { break };

        let sent = tokio::select! {
            biased;
            _ = wait_for_stop(&mut stop) => break,
            sent = jobs.send(into_job(item)) => sent,
        };

        if sent.is_err() {
            break;
        }
    }

    tracing::debug!("{} dispatcher exiting", name);
}

/// Runs jobs from the shared pool queue until it closes
async fn worker_loop(id: usize, shared: Arc<Shared>, jobs: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let mut jobs = jobs.lock().await;
            jobs.recv().await
        };

        let Some(job) = job else { break };

        // Dispatched but not started before the stop signal
        if shared.is_stopped() {
            continue;
        }

        match job {
            Job::Fetch(url) => shared.fetch_task(url).await,
            Job::Handle(fetched) => shared.response_task(fetched).await,
        }
    }

    tracing::trace!("worker {} exiting", id);
}

/// Resolves once the stop flag is set (or its sender is gone)
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        let stopped = *stop.borrow_and_update();
        if stopped || stop.changed().await.is_err() {
            return;
        }
    }
}
