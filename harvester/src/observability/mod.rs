//! Observability utilities.
//!
//! This module provides:
//! - Global subscriber setup with an `RUST_LOG` filter
//! - Span timing
//! - Periodic extraction progress

mod logging;
mod progress;

pub use logging::{init_tracing, LogFormat, SpanTimer};
pub use progress::ProgressReporter;
