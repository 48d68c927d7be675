//! Diagnostic logging through `tracing`.
//!
//! The rename transcript itself goes to stdout with `println!`; this module
//! only wires up the stderr log stream (`Reading CSV mapping from ...`,
//! `Found N files in input folder`, per-file warnings).

use std::io;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub with_ansi: bool,
    /// Let `RUST_LOG` override `level` when it is set.
    pub use_env_filter: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            with_ansi: false,
            use_env_filter: true,
        }
    }
}

/// Installs the global subscriber. Call once, before any command runs.
pub fn init_logging(config: &LogConfig) {
    let filter = build_env_filter(config);
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.with_ansi)
        .with_target(false);
    tracing_subscriber::registry().with(filter).with(layer).init();
}

fn build_env_filter(config: &LogConfig) -> EnvFilter {
    let fallback = || EnvFilter::new(format!("warn,csvrename={}", config.level));
    if config.use_env_filter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback())
    } else {
        fallback()
    }
}
