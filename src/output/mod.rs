//! Output module for crawl observability and persistence
//!
//! - `events`: the timestamped GET/SAVE/OK/SKIP/FAIL event stream
//! - `stats`: run counters and the final report
//! - `writer`: streaming writes of saved bodies

pub mod events;
pub mod stats;
pub mod writer;

pub use events::{CrawlEvent, EventEmitter, EventKind};
pub use stats::{print_report, CrawlReport, CrawlStats};
pub use writer::write_body;
