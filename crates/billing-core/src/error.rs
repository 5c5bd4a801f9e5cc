use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the billing eligibility engine.
#[derive(Error, Debug)]
pub enum BillingError {
    /// A caller-supplied input is malformed: an inverted billing period,
    /// an unknown billing program name, and the like.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An aggregate reaching the evaluator is internally inconsistent.
    /// Indicates an upstream data bug, never a user mistake.
    #[error("Invalid aggregate: {0}")]
    InvalidAggregate(String),

    /// The caller lacks the role required to view a clinic report.
    /// Surfaced by the calling layer; the engine only defines the kind.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// A snapshot file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the billing crates.
pub type Result<T> = std::result::Result<T, BillingError>;
