//! Error types for propcrawl.
//!
//! Library crates use [`CrawlError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//! Driver implementations fail with [`DriverError`], which the stage use cases
//! convert into error events tagged with the failing [`Stage`].

use std::path::PathBuf;
use std::time::Duration;

use crate::types::Stage;

/// Faults raised by a Driver Capability implementation.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// A bounded wait ran out before the page reached the expected state.
    #[error("timed out after {}ms waiting for {what}", .waited.as_millis())]
    Timeout { what: String, waited: Duration },

    /// The page was loaded but the expected element is absent.
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },

    /// Navigation to the target page or panel failed.
    #[error("navigation error: {0}")]
    Navigation(String),

    /// The browser session is unusable (not started, closed, crashed).
    #[error("session error: {0}")]
    Session(String),
}

/// Top-level error type for all propcrawl operations.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Result or preset persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Data validation error (unknown preset, unmatched label, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Stage input rejected before the driver was touched.
    #[error("invalid input for {stage}: {message}")]
    InvalidInput { stage: Stage, message: String },

    /// The driver failed while executing a stage.
    #[error("{stage} failed: {source}")]
    Driver {
        stage: Stage,
        #[source]
        source: DriverError,
    },

    /// A candidate that does not belong to the current run's candidate set.
    #[error("stale candidate for {stage}: {message}")]
    StaleCandidate { stage: Stage, message: String },

    /// An orchestrator operation was called in a state that does not allow it.
    #[error("invalid state for {stage}: {message}")]
    InvalidState { stage: Stage, message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CrawlError>;

impl CrawlError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an invalid-input error for a stage.
    pub fn invalid_input(stage: Stage, msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            stage,
            message: msg.into(),
        }
    }

    /// Wrap a driver fault raised during `stage`.
    pub fn driver(stage: Stage, source: DriverError) -> Self {
        Self::Driver { stage, source }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The workflow stage this error belongs to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::InvalidInput { stage, .. }
            | Self::Driver { stage, .. }
            | Self::StaleCandidate { stage, .. }
            | Self::InvalidState { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
