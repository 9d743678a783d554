//! Stage 3: building → detail fields → [`CrawlResult`].

use std::sync::Arc;

use chrono::Utc;
use propcrawl_shared::{Building, CrawlError, CrawlResult, ResolvedAddress, Result, Stage};
use tracing::{debug, info, instrument, warn};

use super::fail;
use crate::bus::EventBus;
use crate::driver::Driver;
use crate::events::{CrawlingCompleteEvent, StatusEvent};

/// Extracts the detail fields of one building.
///
/// The driver owns the wait for the detail panel to finish rendering; this
/// stage never sleeps.
#[derive(Debug, Clone)]
pub struct DetailCrawl {
    bus: Arc<EventBus>,
}

impl DetailCrawl {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    #[instrument(skip_all, fields(building = %building.label))]
    pub fn execute(
        &self,
        driver: &mut dyn Driver,
        address: &ResolvedAddress,
        building: &Building,
    ) -> Result<CrawlResult> {
        self.bus
            .publish(StatusEvent::new(format!("crawling details: {}", building.label)));

        let extracted = driver.extract_details(building).map_err(|source| {
            fail(
                &self.bus,
                Stage::DetailCrawl,
                CrawlError::driver(Stage::DetailCrawl, source),
            )
        })?;

        let total = extracted.len();
        let items: Vec<_> = extracted
            .into_iter()
            .filter(|item| !item.title.trim().is_empty() && !item.content.trim().is_empty())
            .collect();
        if items.len() != total {
            warn!(dropped = total - items.len(), "dropped detail fields with blank title or content");
        }

        for item in &items {
            debug!(title = %item.title, content = %item.content, "detail field");
            if item.is_missing() {
                warn!(title = %item.title, "detail field has no value");
            }
        }

        let result = CrawlResult {
            timestamp: Utc::now(),
            address: address.label.clone(),
            building: building.label.clone(),
            items,
        };

        info!(items = result.items.len(), "detail crawl completed");
        self.bus.publish(CrawlingCompleteEvent {
            result: result.clone(),
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use propcrawl_shared::{CrawlItem, DriverError, MISSING_VALUE};

    use super::*;
    use crate::events::{CrawlEvent, EventKind};
    use crate::test_support::{DriverCall, EventLog, ScriptedDriver, address, building};

    fn setup() -> (EventLog, DetailCrawl) {
        let bus = Arc::new(EventBus::new());
        let log = EventLog::attach(&bus);
        (log, DetailCrawl::new(bus))
    }

    #[test]
    fn assembles_result_in_driver_order() {
        let (log, stage) = setup();
        let mut driver = ScriptedDriver::new();
        driver.push_details(Ok(vec![
            CrawlItem::new("전용면적", "84.5㎡"),
            CrawlItem::new("층수", "15층"),
            CrawlItem::new("층수", "지하 2층"),
        ]));

        let before = Utc::now();
        let result = stage
            .execute(
                &mut driver,
                &address("서울시 강남구 테헤란로 / 역삼동", "0"),
                &building("강남빌딩(테헤란로 123)", "0/0"),
            )
            .expect("crawl");

        assert!(result.timestamp >= before);
        assert_eq!(result.address, "서울시 강남구 테헤란로 / 역삼동");
        assert_eq!(result.building, "강남빌딩(테헤란로 123)");
        let titles: Vec<&str> = result.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["전용면적", "층수", "층수"]);
        assert_eq!(driver.calls(), [DriverCall::ExtractDetails("0/0".into())]);

        match log.last_terminal() {
            Some(CrawlEvent::CrawlingComplete(event)) => assert_eq!(event.result, result),
            other => panic!("unexpected terminal event: {other:?}"),
        }
    }

    #[test]
    fn blank_fields_are_dropped_and_missing_values_kept() {
        let (_log, stage) = setup();
        let mut driver = ScriptedDriver::new();
        driver.push_details(Ok(vec![
            CrawlItem::new("", "orphan"),
            CrawlItem::new("대지면적", MISSING_VALUE),
            CrawlItem::new("용도", "  "),
        ]));

        let result = stage
            .execute(&mut driver, &address("a", "0"), &building("b", "0/0"))
            .expect("crawl");
        assert_eq!(result.items, [CrawlItem::new("대지면적", MISSING_VALUE)]);
    }

    #[test]
    fn timeout_becomes_error_event() {
        let (log, stage) = setup();
        let mut driver = ScriptedDriver::new();
        driver.push_details(Err(DriverError::Timeout {
            what: ".mfs-agent-main-tab-div".into(),
            waited: Duration::from_secs(5),
        }));

        let err = stage
            .execute(&mut driver, &address("a", "0"), &building("b", "0/0"))
            .unwrap_err();
        assert!(matches!(
            err,
            CrawlError::Driver {
                stage: Stage::DetailCrawl,
                source: DriverError::Timeout { .. }
            }
        ));
        assert_eq!(log.terminal_kinds(), [EventKind::Error]);
        assert!(log.errors()[0].message.contains("timed out"));
    }
}
