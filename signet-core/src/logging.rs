//! Logging initialisation
//!
//! Structured logging on top of `tracing-subscriber` with selectable output format

use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Mutex;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Whether to include file and line information
    pub include_location: bool,
    /// Whether to include thread information
    pub include_thread: bool,
    /// Log file path. Logs go to stdout when unset
    pub log_file_path: Option<String>,
    /// Emit a line when instrumented spans close
    pub log_span_close: bool,
    /// Custom filter directives
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            include_thread: false,
            log_file_path: None,
            log_span_close: false,
            filter_directives: vec![
                "signet_core=info".to_string(),
                "signet_sessions=info".to_string(),
                "signet_web=debug".to_string(),
            ],
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global tracing subscriber
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for directive in &config.filter_directives {
        filter = filter.add_directive(directive.parse()?);
    }

    let span_events = if config.log_span_close {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread)
        .with_thread_names(config.include_thread);

    let layer: BoxedLayer = match (&config.format, &config.log_file_path) {
        (LogFormat::Json, None) => base.json().with_writer(io::stdout).boxed(),
        (LogFormat::Pretty, None) => base.pretty().with_writer(io::stdout).boxed(),
        (LogFormat::Compact, None) => base.compact().with_writer(io::stdout).boxed(),
        (format, Some(path)) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let base = base.with_ansi(false).with_writer(Mutex::new(file));
            match format {
                LogFormat::Json => base.json().boxed(),
                LogFormat::Pretty => base.pretty().boxed(),
                LogFormat::Compact => base.compact().boxed(),
            }
        }
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;

    Ok(())
}

/// Performance monitoring utilities
pub mod performance {
    use std::time::Instant;
    use tracing::info_span;

    /// Measure and log execution time of a synchronous operation
    pub fn measure_sync<F, T>(operation_name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let _span = info_span!("performance", operation = operation_name).entered();
        let start = Instant::now();

        let result = f();

        tracing::debug!(
            target: "performance",
            operation = operation_name,
            duration_us = start.elapsed().as_micros() as u64,
            "Operation completed"
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_cover_workspace() {
        let config = LoggingConfig::default();
        assert!(config
            .filter_directives
            .iter()
            .any(|d| d.starts_with("signet_sessions")));
    }

    #[test]
    fn test_measure_sync_returns_value() {
        let value = performance::measure_sync("add", || 2 + 2);
        assert_eq!(value, 4);
    }
}
