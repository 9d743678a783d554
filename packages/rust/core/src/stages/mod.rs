//! The three stage use cases composing a run.
//!
//! Each stage calls the [`Driver`](crate::driver::Driver) once, publishes
//! progress through the [`EventBus`](crate::bus::EventBus), and ends every
//! call with exactly one terminal event. Driver faults are caught here and
//! never escape as raw driver errors.

mod address_search;
mod building_selection;
mod detail_crawl;

use propcrawl_shared::{CrawlError, Stage};
use tracing::warn;

use crate::bus::EventBus;
use crate::events::ErrorEvent;

pub use address_search::AddressSearch;
pub use building_selection::{BuildingOutcome, BuildingSelection};
pub use detail_crawl::DetailCrawl;

/// Publish the terminal error event for `err` and hand it back to the caller.
pub(crate) fn fail(bus: &EventBus, stage: Stage, err: CrawlError) -> CrawlError {
    warn!(%stage, error = %err, "stage failed");
    bus.publish(ErrorEvent::from_error(stage, &err));
    err
}
