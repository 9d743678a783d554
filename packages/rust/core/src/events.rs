//! The closed set of domain events published by the crawl engine.
//!
//! Each event kind has its own payload struct; [`CrawlEvent`] is the tagged
//! union the [`EventBus`](crate::bus::EventBus) dispatches on, keyed by
//! [`EventKind`].

use propcrawl_shared::{Building, CrawlError, CrawlResult, ResolvedAddress, Stage};

/// Discriminant used as the bus dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Status,
    AddressesFound,
    BuildingsFound,
    CrawlingComplete,
    Error,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Status,
        EventKind::AddressesFound,
        EventKind::BuildingsFound,
        EventKind::CrawlingComplete,
        EventKind::Error,
    ];
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Progress narration. May be published any number of times before a
/// stage's terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub message: String,
}

impl StatusEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Terminal event of a successful address search. May be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressesFoundEvent {
    pub addresses: Vec<ResolvedAddress>,
}

/// Terminal event of a successful building selection. May be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingsFoundEvent {
    pub buildings: Vec<Building>,
}

/// Terminal event of a successful detail crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlingCompleteEvent {
    pub result: CrawlResult,
}

/// Terminal event of a failed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub stage: Stage,
    pub message: String,
}

impl ErrorEvent {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    /// Build the event for `err`, attributing it to `stage` when the error
    /// itself carries none.
    pub fn from_error(stage: Stage, err: &CrawlError) -> Self {
        Self::new(err.stage().unwrap_or(stage), err.to_string())
    }
}

// ---------------------------------------------------------------------------
// CrawlEvent
// ---------------------------------------------------------------------------

/// Tagged union of every event the engine publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    Status(StatusEvent),
    AddressesFound(AddressesFoundEvent),
    BuildingsFound(BuildingsFoundEvent),
    CrawlingComplete(CrawlingCompleteEvent),
    Error(ErrorEvent),
}

impl CrawlEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Status(_) => EventKind::Status,
            Self::AddressesFound(_) => EventKind::AddressesFound,
            Self::BuildingsFound(_) => EventKind::BuildingsFound,
            Self::CrawlingComplete(_) => EventKind::CrawlingComplete,
            Self::Error(_) => EventKind::Error,
        }
    }

    /// Whether this event ends a stage call.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Status(_))
    }
}

/// A payload type that belongs to exactly one [`EventKind`].
///
/// Lets subscribers register typed handlers via
/// [`EventBus::on`](crate::bus::EventBus::on).
pub trait DomainEvent: Into<CrawlEvent> {
    const KIND: EventKind;

    /// Borrow the payload if `event` is of this kind.
    fn from_event(event: &CrawlEvent) -> Option<&Self>;
}

macro_rules! domain_event {
    ($payload:ident, $variant:ident) => {
        impl From<$payload> for CrawlEvent {
            fn from(event: $payload) -> Self {
                CrawlEvent::$variant(event)
            }
        }

        impl DomainEvent for $payload {
            const KIND: EventKind = EventKind::$variant;

            fn from_event(event: &CrawlEvent) -> Option<&Self> {
                match event {
                    CrawlEvent::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

domain_event!(StatusEvent, Status);
domain_event!(AddressesFoundEvent, AddressesFound);
domain_event!(BuildingsFoundEvent, BuildingsFound);
domain_event!(CrawlingCompleteEvent, CrawlingComplete);
domain_event!(ErrorEvent, Error);
