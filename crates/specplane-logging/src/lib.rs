//! # specplane-logging
//!
//! Logging for the specplane interview engine.
//!
//! ## Key Types
//!
//! - [`Logger`] - Structured event logging
//! - [`LogEvent`] - Interview lifecycle events
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//! - [`TranscriptWriter`] - JSONL audit trail of one interview

mod events;
mod transcript;

pub use events::{LogEvent, LogFormat, Logger};
pub use transcript::{TranscriptLine, TranscriptWriter};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false).with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }
}
