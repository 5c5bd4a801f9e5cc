use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let upper = log_level.to_uppercase();
    let normalised = match upper.as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" => "error",
        other => other,
    };

    let filter = EnvFilter::try_new(normalised).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .init();

    Ok(())
}

// ── Data-path discovery ────────────────────────────────────────────────────────

/// Attempt to locate the snapshot data directory on the local system.
///
/// Checks the following paths in order and returns the first that exists:
/// 1. `./snapshots/`
/// 2. `~/.rpm-billing/snapshots/`
///
/// Returns `None` when neither path exists.
pub fn discover_data_path() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("snapshots")];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".rpm-billing").join("snapshots"));
    }
    candidates.into_iter().find(|p| p.exists())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
