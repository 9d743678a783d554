//! JSON file storage for crawl results and presets.
//!
//! The [`Storage`] struct owns a data directory laid out as:
//!
//! ```text
//! <data_dir>/
//!   results/latest_crawl.json     last finished crawl (overwritten)
//!   presets/crawl_presets.json    field titles to project: [{"title": ...}]
//!   presets/run_presets.json      named replayable runs
//! ```
//!
//! Writes go to a sibling temp file first and are renamed into place, so a
//! crash never leaves a half-written file behind.

use std::fs;
use std::path::{Path, PathBuf};

use propcrawl_shared::{CrawlError, CrawlResult, PresetSource, Result, ResultSink, RunPreset};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const RESULTS_DIR: &str = "results";
const PRESETS_DIR: &str = "presets";
const LATEST_RESULT: &str = "latest_crawl.json";
const FIELD_PRESETS: &str = "crawl_presets.json";
const RUN_PRESETS: &str = "run_presets.json";

/// One entry of the field preset file.
#[derive(Debug, Serialize, Deserialize)]
struct FieldPreset {
    #[serde(default)]
    title: Option<String>,
}

/// Primary storage handle over a data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Open or create the data directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [RESULTS_DIR, PRESETS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| CrawlError::io(&path, e))?;
        }
        debug!(root = %root.display(), "storage opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn latest_result_path(&self) -> PathBuf {
        self.root.join(RESULTS_DIR).join(LATEST_RESULT)
    }

    fn field_presets_path(&self) -> PathBuf {
        self.root.join(PRESETS_DIR).join(FIELD_PRESETS)
    }

    fn run_presets_path(&self) -> PathBuf {
        self.root.join(PRESETS_DIR).join(RUN_PRESETS)
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Write `result` as the latest crawl, replacing any previous one.
    pub fn save_result(&self, result: &CrawlResult) -> Result<PathBuf> {
        let path = self.latest_result_path();
        write_json(&path, result)?;
        info!(
            path = %path.display(),
            items = result.items.len(),
            "crawl result saved"
        );
        Ok(path)
    }

    /// The latest saved crawl, if any.
    pub fn latest_result(&self) -> Result<Option<CrawlResult>> {
        read_json(&self.latest_result_path())
    }

    // -----------------------------------------------------------------------
    // Field presets
    // -----------------------------------------------------------------------

    /// Replace the saved field titles. Blank titles are dropped; if none
    /// remain, nothing is written. Returns the number of titles saved.
    pub fn save_field_titles<S: AsRef<str>>(&self, titles: &[S]) -> Result<usize> {
        let presets: Vec<FieldPreset> = titles
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .map(|t| FieldPreset {
                title: Some(t.to_string()),
            })
            .collect();

        if presets.is_empty() {
            warn!("no field titles to save; keeping the existing presets");
            return Ok(0);
        }

        let path = self.field_presets_path();
        write_json(&path, &presets)?;
        info!(path = %path.display(), count = presets.len(), "field presets saved");
        Ok(presets.len())
    }

    /// Saved field titles. A missing or unreadable file yields an empty list.
    pub fn load_field_titles(&self) -> Vec<String> {
        let path = self.field_presets_path();
        match read_json::<Vec<FieldPreset>>(&path) {
            Ok(Some(presets)) => presets
                .into_iter()
                .filter_map(|p| p.title)
                .filter(|t| !t.trim().is_empty())
                .collect(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable field presets");
                Vec::new()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Run presets
    // -----------------------------------------------------------------------

    /// All saved run presets, in save order.
    pub fn list_run_presets(&self) -> Result<Vec<RunPreset>> {
        Ok(read_json(&self.run_presets_path())?.unwrap_or_default())
    }

    /// Save `preset`, replacing any preset with the same name.
    pub fn save_run_preset(&self, preset: RunPreset) -> Result<()> {
        if preset.name.trim().is_empty() {
            return Err(CrawlError::validation("run preset name is empty"));
        }
        if preset.query.trim().is_empty() {
            return Err(CrawlError::validation(format!(
                "run preset '{}' has an empty query",
                preset.name
            )));
        }

        let mut presets = self.list_run_presets()?;
        match presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => {
                debug!(name = %preset.name, "replacing run preset");
                *existing = preset;
            }
            None => presets.push(preset),
        }

        let path = self.run_presets_path();
        write_json(&path, &presets)?;
        info!(path = %path.display(), count = presets.len(), "run presets saved");
        Ok(())
    }
}

impl ResultSink for Storage {
    fn save(&self, result: &CrawlResult) -> Result<PathBuf> {
        self.save_result(result)
    }
}

impl PresetSource for Storage {
    fn run_preset(&self, name: &str) -> Result<Option<RunPreset>> {
        Ok(self
            .list_run_presets()?
            .into_iter()
            .find(|p| p.name == name))
    }

    fn field_titles(&self) -> Result<Vec<String>> {
        Ok(self.load_field_titles())
    }
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CrawlError::Storage(format!("failed to serialize {}: {e}", path.display())))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| CrawlError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| CrawlError::io(path, e))?;
    Ok(())
}

/// `Ok(None)` when the file does not exist.
fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CrawlError::io(path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| CrawlError::parse(format!("{}: {e}", path.display())))
}
