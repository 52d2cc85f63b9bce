//! Crawl statistics
//!
//! Counters are updated by the workers while the crawl runs and frozen into
//! a [`CrawlReport`] when it ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters shared by all workers of one run
#[derive(Debug, Default)]
pub struct CrawlStats {
    fetched: AtomicU64,
    transport_errors: AtomicU64,
    saved: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    urls_enqueued: AtomicU64,
    urls_dropped: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_saved(&self) {
        self.saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.urls_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.urls_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Freezes the counters into a report
    pub fn snapshot(&self, elapsed: Duration) -> CrawlReport {
        CrawlReport {
            fetched: self.fetched.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            urls_enqueued: self.urls_enqueued.load(Ordering::Relaxed),
            urls_dropped: self.urls_dropped.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// Summary of a finished crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Fetches attempted, successful or not
    pub fetched: u64,

    /// Fetches that failed in transport
    pub transport_errors: u64,

    /// Responses handled with an OK outcome
    pub saved: u64,

    /// Responses no rule matched
    pub skipped: u64,

    /// Responses that failed (including transport errors)
    pub failed: u64,

    /// URLs accepted onto the URL queue, the seed included
    pub urls_enqueued: u64,

    /// URLs rejected because the engine had stopped
    pub urls_dropped: u64,

    pub elapsed: Duration,
}

impl CrawlReport {
    /// Number of responses that reached a terminal outcome
    pub fn handled(&self) -> u64 {
        self.saved + self.skipped + self.failed
    }
}

/// Prints a report to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Mirror Statistics ===\n");

    println!("Overview:");
    println!("  URLs queued: {}", report.urls_enqueued);
    println!("  Fetches: {}", report.fetched);
    if report.urls_dropped > 0 {
        println!("  URLs dropped after stop: {}", report.urls_dropped);
    }
    println!();

    println!("Outcomes:");
    println!("  OK: {}", report.saved);
    println!("  SKIP: {}", report.skipped);
    println!(
        "  FAIL: {} ({} transport errors)",
        report.failed, report.transport_errors
    );
    println!();

    let rate = if report.elapsed.as_secs_f64() > 0.0 {
        report.fetched as f64 / report.elapsed.as_secs_f64()
    } else {
        0.0
    };
    println!(
        "Finished in {:.2}s ({:.2} fetches/sec)",
        report.elapsed.as_secs_f64(),
        rate
    );
}
