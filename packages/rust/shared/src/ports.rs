//! Ports for the persistence collaborators around the crawl engine.
//!
//! The engine never writes anything itself; it hands finished results to a
//! [`ResultSink`] and takes replayable inputs from a [`PresetSource`].

use std::path::PathBuf;

use crate::error::Result;
use crate::types::{CrawlResult, RunPreset};

/// Durable storage for finished crawl results.
pub trait ResultSink {
    /// Persist `result` and return where it was written.
    fn save(&self, result: &CrawlResult) -> Result<PathBuf>;
}

/// Supplies pre-filled stage inputs and field selections.
pub trait PresetSource {
    /// Look up a named run preset.
    fn run_preset(&self, name: &str) -> Result<Option<RunPreset>>;

    /// Field titles the user wants projected out of a result.
    fn field_titles(&self) -> Result<Vec<String>>;
}
