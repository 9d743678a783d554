//! Crawl orchestration engine for propcrawl.
//!
//! This crate ties the event bus, the three stage use cases, and the
//! [`Driver`] capability together into end-to-end runs (see [`Orchestrator`]).
//! It performs no I/O of its own; page access lives behind [`Driver`].

pub mod bus;
pub mod driver;
pub mod events;
pub mod orchestrator;
pub mod projection;
pub mod stages;

#[cfg(test)]
mod test_support;

pub use bus::{EventBus, HandlerError, HandlerResult, SubscriptionId};
pub use driver::Driver;
pub use events::{
    AddressesFoundEvent, BuildingsFoundEvent, CrawlEvent, CrawlingCompleteEvent, DomainEvent,
    ErrorEvent, EventKind, StatusEvent,
};
pub use orchestrator::{BuildingChoice, Orchestrator, WorkflowState};
pub use projection::{FIELD_ABSENT, ProjectedField, project_fields};
pub use stages::{AddressSearch, BuildingOutcome, BuildingSelection, DetailCrawl};
