//! Tracing setup for the `retitle` binary.
//!
//! Environment variables:
//!   LOG_FORMAT  - "json" or "text" (default: "text")
//!   LOG_FILE    - path to log file (optional, enables file logging)
//!   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
//!   RUST_LOG    - standard env filter (default: "retitle=info,...")
//!
//! Logs go to stderr so stdout carries only the report.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str =
    "retitle=info,retitle_rename=info,retitle_extract=warn,retitle_inference=warn";

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init_tracing(verbose: bool) -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok().filter(|p| !p.is_empty());
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let default_filter = if verbose {
        "retitle=debug,retitle_rename=debug,retitle_extract=debug,retitle_inference=debug"
    } else {
        DEFAULT_FILTER
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("retitle.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // no ANSI in files unless asked for
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}
