//! In-process publish/subscribe hub for crawl events.
//!
//! # Guarantees
//!
//! - **Synchronous delivery**: `publish` calls every handler registered for
//!   the event's kind on the calling thread, in registration order, before it
//!   returns.
//! - **Failure isolation**: a handler that returns an error or panics is
//!   logged and skipped; the remaining handlers still run.
//! - **Re-entrancy**: handlers may publish. Dispatch runs against a snapshot
//!   of the subscriber list taken before the first handler is called, so no
//!   lock is held while handlers execute.
//!
//! Handlers run inside the publishing stage, so long blocking work in a
//! handler extends that stage's latency.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{error, trace};

use crate::events::{CrawlEvent, DomainEvent, EventKind};

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type handlers return.
pub type HandlerResult = std::result::Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&CrawlEvent) -> HandlerResult + Send + Sync>;

/// Identifies one registration, for [`EventBus::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Dispatch table from event kind to handler list.
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for every subsequently published event of `kind`.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&CrawlEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(handler))
    }

    /// Register a typed handler for one payload type.
    ///
    /// ```ignore
    /// bus.on(|event: &StatusEvent| {
    ///     println!("{}", event.message);
    ///     Ok(())
    /// });
    /// ```
    pub fn on<E, F>(&self, handler: F) -> SubscriptionId
    where
        E: DomainEvent,
        F: Fn(&E) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(E::KIND, move |event| match E::from_event(event) {
            Some(payload) => handler(payload),
            None => Ok(()),
        })
    }

    /// Register one handler for all event kinds.
    pub fn subscribe_all<F>(&self, handler: F) -> Vec<SubscriptionId>
    where
        F: Fn(&CrawlEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        EventKind::ALL
            .iter()
            .map(|kind| self.register(*kind, handler.clone()))
            .collect()
    }

    /// Remove a registration. Returns `false` if it was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut removed = false;
        for handlers in subscribers.values_mut() {
            let before = handlers.len();
            handlers.retain(|(existing, _)| *existing != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    /// Deliver `event` to every handler registered for its kind.
    ///
    /// Returns the number of handlers that completed without error.
    pub fn publish(&self, event: impl Into<CrawlEvent>) -> usize {
        let event = event.into();
        let kind = event.kind();

        let snapshot: Vec<(SubscriptionId, Handler)> = {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.get(&kind).cloned().unwrap_or_default()
        };

        trace!(?kind, handlers = snapshot.len(), "publishing event");

        let mut delivered = 0;
        for (id, handler) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    error!(?kind, subscription = id.0, error = %e, "event handler failed");
                }
                Err(panic_info) => {
                    let panic_msg = extract_panic_message(&panic_info);
                    error!(?kind, subscription = id.0, panic = %panic_msg, "event handler panicked");
                }
            }
        }
        delivered
    }

    /// Number of handlers registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    fn register(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, handler));
        id
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let total: usize = subscribers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("subscriber_count", &total)
            .finish()
    }
}

fn extract_panic_message(panic_info: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
