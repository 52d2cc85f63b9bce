//! State module for tracking the crawl engine lifecycle
//!
//! - `EngineState`: RUNNING, DRAINING and STOPPED, with the legal transitions between them

mod engine_state;

pub use engine_state::EngineState;
