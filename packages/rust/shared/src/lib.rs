//! Shared types, error model, configuration, and collaborator ports for propcrawl.
//!
//! This crate is the foundation depended on by all other propcrawl crates.
//! It provides:
//! - [`CrawlError`] and [`DriverError`] — the unified error types
//! - Domain types ([`AddressQuery`], [`ResolvedAddress`], [`Building`], [`CrawlItem`], [`CrawlResult`], [`RunId`])
//! - Configuration ([`AppConfig`], [`WaitBudget`], [`WorkflowConfig`], config loading)
//! - Ports for the persistence collaborators ([`ResultSink`], [`PresetSource`])

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DriverConfig, StorageConfig, WaitBudget, WorkflowConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{CrawlError, DriverError, Result};
pub use ports::{PresetSource, ResultSink};
pub use types::{
    AddressQuery, Building, CrawlItem, CrawlResult, MISSING_VALUE, ResolvedAddress, RunId,
    RunPreset, Stage,
};
