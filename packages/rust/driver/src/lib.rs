//! Page-snapshot implementation of the crawl [`Driver`](propcrawl_core::Driver).
//!
//! This crate provides:
//! - [`parser`] — selector-based extraction of addresses, buildings, and detail fields
//! - [`wait`] — bounded polling used for every page read
//! - [`SnapshotDriver`] — a driver that reads captured pages from a directory

pub mod parser;
pub mod snapshot;
pub mod wait;

pub use parser::{parse_addresses, parse_buildings, parse_details};
pub use snapshot::SnapshotDriver;
pub use wait::{PageState, poll_until};
