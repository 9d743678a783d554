//! Stage 1: free-text query → address candidates.

use std::sync::Arc;

use propcrawl_shared::{AddressQuery, CrawlError, ResolvedAddress, Result, RunId, Stage};
use tracing::{info, instrument};

use super::fail;
use crate::bus::EventBus;
use crate::driver::Driver;
use crate::events::{AddressesFoundEvent, StatusEvent};

/// Resolves an address query to candidate addresses.
#[derive(Debug, Clone)]
pub struct AddressSearch {
    bus: Arc<EventBus>,
}

impl AddressSearch {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Search for `raw_query` and stamp every candidate with `run`.
    ///
    /// Blank input is rejected before the driver is touched. Zero candidates
    /// is a normal outcome and yields an empty [`AddressesFoundEvent`].
    #[instrument(skip_all, fields(run = %run))]
    pub fn execute(
        &self,
        driver: &mut dyn Driver,
        run: RunId,
        raw_query: &str,
    ) -> Result<Vec<ResolvedAddress>> {
        let query = AddressQuery::parse(raw_query)
            .map_err(|err| fail(&self.bus, Stage::AddressSearch, err))?;

        self.bus
            .publish(StatusEvent::new(format!("searching address: {query}")));

        let addresses: Vec<ResolvedAddress> = driver
            .search_address(&query)
            .map_err(|source| {
                fail(
                    &self.bus,
                    Stage::AddressSearch,
                    CrawlError::driver(Stage::AddressSearch, source),
                )
            })?
            .into_iter()
            .map(|address| address.with_run(run))
            .collect();

        info!(query = %query, count = addresses.len(), "address search completed");
        self.bus.publish(AddressesFoundEvent {
            addresses: addresses.clone(),
        });
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use propcrawl_shared::DriverError;

    use super::*;
    use crate::events::{CrawlEvent, EventKind};
    use crate::test_support::{DriverCall, EventLog, ScriptedDriver, address};

    fn setup() -> (Arc<EventBus>, EventLog, AddressSearch) {
        let bus = Arc::new(EventBus::new());
        let log = EventLog::attach(&bus);
        let stage = AddressSearch::new(bus.clone());
        (bus, log, stage)
    }

    #[test]
    fn found_addresses_are_stamped_and_published() {
        let (_bus, log, stage) = setup();
        let mut driver = ScriptedDriver::new();
        driver.push_addresses(Ok(vec![address("강남구 역삼동", "0"), address("강남구 삼성동", "1")]));

        let run = RunId::new();
        let found = stage.execute(&mut driver, run, "  서울시 강남구 ").expect("search");

        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|a| a.run() == Some(run)));
        assert_eq!(
            driver.calls(),
            [DriverCall::SearchAddress("서울시 강남구".into())]
        );
        assert_eq!(log.terminal_kinds(), [EventKind::AddressesFound]);
        assert!(log.kinds().starts_with(&[EventKind::Status]));
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let (_bus, log, stage) = setup();
        let mut driver = ScriptedDriver::new();
        driver.push_addresses(Ok(vec![]));

        let found = stage.execute(&mut driver, RunId::new(), "없는 주소").expect("search");
        assert!(found.is_empty());
        match log.last_terminal() {
            Some(CrawlEvent::AddressesFound(event)) => assert!(event.addresses.is_empty()),
            other => panic!("unexpected terminal event: {other:?}"),
        }
    }

    #[test]
    fn blank_query_never_reaches_the_driver() {
        for raw in ["", "   ", "\n\t"] {
            let (_bus, log, stage) = setup();
            let mut driver = ScriptedDriver::new();

            let err = stage.execute(&mut driver, RunId::new(), raw).unwrap_err();
            assert!(matches!(err, CrawlError::InvalidInput { .. }));
            assert!(driver.calls().is_empty());

            let errors = log.errors();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].stage, Stage::AddressSearch);
            assert!(errors[0].message.contains("empty"));
            assert_eq!(log.terminal_kinds(), [EventKind::Error]);
        }
    }

    #[test]
    fn driver_failure_becomes_error_event() {
        let (_bus, log, stage) = setup();
        let mut driver = ScriptedDriver::new();
        driver.push_addresses(Err(DriverError::Navigation("search box missing".into())));

        let err = stage.execute(&mut driver, RunId::new(), "서울시").unwrap_err();
        assert_eq!(err.stage(), Some(Stage::AddressSearch));

        assert_eq!(log.terminal_kinds(), [EventKind::Error]);
        assert!(log.errors()[0].message.contains("search box missing"));
    }
}
