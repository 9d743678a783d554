//! Core domain types for a crawl run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CrawlError, Result};

/// Placeholder content the driver reports for a field whose value is absent.
pub const MISSING_VALUE: &str = "값 없음";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One of the three sequential operations composing a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AddressSearch,
    BuildingSelection,
    DetailCrawl,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AddressSearch => "address search",
            Self::BuildingSelection => "building selection",
            Self::DetailCrawl => "detail crawl",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// AddressQuery
// ---------------------------------------------------------------------------

/// A trimmed, non-empty free-text address query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressQuery(String);

impl AddressQuery {
    /// Trim `raw` and reject empty or whitespace-only input.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CrawlError::invalid_input(
                Stage::AddressSearch,
                "address query is empty",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AddressQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// One address candidate produced by the address search stage.
///
/// `locator` is opaque to everything but the driver that produced it.
/// `run` is stamped by the stage that hands the candidate out; candidates
/// straight from a driver carry no run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub label: String,
    pub locator: String,
    run: Option<RunId>,
}

impl ResolvedAddress {
    pub fn new(label: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            locator: locator.into(),
            run: None,
        }
    }

    /// The run that produced this candidate, if it has been stamped.
    pub fn run(&self) -> Option<RunId> {
        self.run
    }

    /// Stamp the candidate with the run it belongs to.
    pub fn with_run(mut self, run: RunId) -> Self {
        self.run = Some(run);
        self
    }
}

/// One building candidate produced by the building selection stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Building {
    pub label: String,
    pub locator: String,
    run: Option<RunId>,
}

impl Building {
    pub fn new(label: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            locator: locator.into(),
            run: None,
        }
    }

    /// The run that produced this candidate, if it has been stamped.
    pub fn run(&self) -> Option<RunId> {
        self.run
    }

    /// Stamp the candidate with the run it belongs to.
    pub fn with_run(mut self, run: RunId) -> Self {
        self.run = Some(run);
        self
    }
}

// ---------------------------------------------------------------------------
// Crawl output
// ---------------------------------------------------------------------------

/// A single extracted detail field. Titles may repeat within one result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlItem {
    /// Field label (e.g., `전용면적`).
    pub title: String,
    /// Field value (e.g., `84.5㎡`).
    pub content: String,
}

impl CrawlItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Whether the driver reported the value as absent.
    pub fn is_missing(&self) -> bool {
        self.content == MISSING_VALUE
    }
}

/// Terminal artifact of a successful run.
///
/// Serialized in the stable result schema
/// `{timestamp, address, building, items: [{title, content}]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    /// When the detail crawl finished.
    pub timestamp: DateTime<Utc>,
    /// Label of the selected address.
    pub address: String,
    /// Label of the selected building.
    pub building: String,
    /// Extracted fields in display order.
    pub items: Vec<CrawlItem>,
}

// ---------------------------------------------------------------------------
// RunPreset
// ---------------------------------------------------------------------------

/// Pre-filled stage inputs that let a run be replayed without interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPreset {
    /// Unique preset name.
    pub name: String,
    /// Free-text address query.
    pub query: String,
    /// Address label to pick; the first candidate when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Building label to pick; the first candidate when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    /// Field titles to project from the result.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}
