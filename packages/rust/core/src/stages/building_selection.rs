//! Stage 2: address → building candidates, with the zero/one/many policy.

use std::sync::Arc;

use propcrawl_shared::{
    Building, CrawlError, CrawlResult, ResolvedAddress, Result, RunId, Stage, WorkflowConfig,
};
use tracing::{info, instrument};

use super::{DetailCrawl, fail};
use crate::bus::EventBus;
use crate::driver::Driver;
use crate::events::{BuildingsFoundEvent, StatusEvent};

/// What a building selection call produced.
#[derive(Debug)]
pub struct BuildingOutcome {
    /// Every candidate for the address, stamped with the run.
    pub buildings: Vec<Building>,
    /// Outcome of the detail crawl when the lone candidate was crawled
    /// automatically; `None` when a choice is still required.
    pub detail: Option<Result<CrawlResult>>,
}

impl BuildingOutcome {
    /// Whether the detail stage already ran within this call.
    pub fn auto_advanced(&self) -> bool {
        self.detail.is_some()
    }
}

/// Resolves an address to buildings and applies the disambiguation policy:
///
/// - no buildings: publish the empty set and stop;
/// - one building: publish it and crawl it immediately (unless disabled by
///   [`WorkflowConfig::auto_select_single_building`]);
/// - several buildings: publish them and wait for an explicit choice.
#[derive(Debug, Clone)]
pub struct BuildingSelection {
    bus: Arc<EventBus>,
    detail: DetailCrawl,
    workflow: WorkflowConfig,
}

impl BuildingSelection {
    pub fn new(bus: Arc<EventBus>, workflow: WorkflowConfig) -> Self {
        Self {
            detail: DetailCrawl::new(bus.clone()),
            bus,
            workflow,
        }
    }

    /// Run the stage with the configured single-building policy.
    pub fn execute(
        &self,
        driver: &mut dyn Driver,
        run: RunId,
        address: &ResolvedAddress,
    ) -> Result<BuildingOutcome> {
        self.execute_with(driver, run, address, self.workflow.auto_select_single_building)
    }

    /// Run the stage, crawling a lone building only when `auto_select` is set.
    #[instrument(skip_all, fields(run = %run, address = %address.label, auto_select = auto_select))]
    pub fn execute_with(
        &self,
        driver: &mut dyn Driver,
        run: RunId,
        address: &ResolvedAddress,
        auto_select: bool,
    ) -> Result<BuildingOutcome> {
        self.bus.publish(StatusEvent::new(format!(
            "listing buildings for {}",
            address.label
        )));

        let buildings: Vec<Building> = driver
            .search_buildings(address)
            .map_err(|source| {
                fail(
                    &self.bus,
                    Stage::BuildingSelection,
                    CrawlError::driver(Stage::BuildingSelection, source),
                )
            })?
            .into_iter()
            .map(|building| building.with_run(run))
            .collect();

        info!(count = buildings.len(), "building search completed");
        self.bus.publish(BuildingsFoundEvent {
            buildings: buildings.clone(),
        });

        let detail = match buildings.as_slice() {
            [only] if auto_select => {
                self.bus.publish(StatusEvent::new(format!(
                    "only one building, crawling {} automatically",
                    only.label
                )));
                Some(self.detail.execute(driver, address, only))
            }
            _ => None,
        };

        Ok(BuildingOutcome { buildings, detail })
    }
}

#[cfg(test)]
mod tests {
    use propcrawl_shared::{CrawlItem, DriverError};

    use super::*;
    use crate::events::EventKind;
    use crate::test_support::{DriverCall, EventLog, ScriptedDriver, address, building};

    fn setup(workflow: WorkflowConfig) -> (EventLog, BuildingSelection) {
        let bus = Arc::new(EventBus::new());
        let log = EventLog::attach(&bus);
        (log, BuildingSelection::new(bus, workflow))
    }

    fn chosen() -> ResolvedAddress {
        address("서울시 강남구 테헤란로 / 역삼동", "0").with_run(RunId::new())
    }

    #[test]
    fn no_buildings_stops_without_detail_crawl() {
        let (log, stage) = setup(WorkflowConfig::default());
        let mut driver = ScriptedDriver::new();
        driver.push_buildings(Ok(vec![]));

        let outcome = stage
            .execute(&mut driver, RunId::new(), &chosen())
            .expect("select");

        assert!(outcome.buildings.is_empty());
        assert!(!outcome.auto_advanced());
        assert_eq!(driver.calls(), [DriverCall::SearchBuildings("0".into())]);
        assert_eq!(log.terminal_kinds(), [EventKind::BuildingsFound]);
    }

    #[test]
    fn single_building_is_crawled_within_the_same_call() {
        let (log, stage) = setup(WorkflowConfig::default());
        let mut driver = ScriptedDriver::new();
        driver.push_buildings(Ok(vec![building("강남빌딩(테헤란로 123)", "0/0")]));
        driver.push_details(Ok(vec![CrawlItem::new("층수", "15층")]));

        let run = RunId::new();
        let outcome = stage.execute(&mut driver, run, &chosen()).expect("select");

        assert_eq!(outcome.buildings.len(), 1);
        assert_eq!(outcome.buildings[0].run(), Some(run));
        let result = outcome.detail.expect("auto-advanced").expect("crawled");
        assert_eq!(result.building, "강남빌딩(테헤란로 123)");
        assert_eq!(
            driver.calls(),
            [
                DriverCall::SearchBuildings("0".into()),
                DriverCall::ExtractDetails("0/0".into()),
            ]
        );
        assert_eq!(
            log.terminal_kinds(),
            [EventKind::BuildingsFound, EventKind::CrawlingComplete]
        );
    }

    #[test]
    fn single_building_waits_when_auto_select_is_off() {
        let (log, stage) = setup(WorkflowConfig {
            auto_select_single_building: false,
        });
        let mut driver = ScriptedDriver::new();
        driver.push_buildings(Ok(vec![building("강남빌딩(테헤란로 123)", "0/0")]));

        let outcome = stage
            .execute(&mut driver, RunId::new(), &chosen())
            .expect("select");

        assert!(!outcome.auto_advanced());
        assert_eq!(driver.calls().len(), 1);
        assert_eq!(log.terminal_kinds(), [EventKind::BuildingsFound]);
    }

    #[test]
    fn explicit_policy_overrides_config() {
        let (log, stage) = setup(WorkflowConfig::default());
        let mut driver = ScriptedDriver::new();
        driver.push_buildings(Ok(vec![building("강남빌딩(테헤란로 123)", "0/0")]));

        let outcome = stage
            .execute_with(&mut driver, RunId::new(), &chosen(), false)
            .expect("select");

        assert!(!outcome.auto_advanced());
        assert_eq!(driver.calls(), [DriverCall::SearchBuildings("0".into())]);
        assert_eq!(log.terminal_kinds(), [EventKind::BuildingsFound]);
    }

    #[test]
    fn many_buildings_wait_for_a_choice() {
        let (log, stage) = setup(WorkflowConfig::default());
        let mut driver = ScriptedDriver::new();
        driver.push_buildings(Ok(vec![
            building("A동(테헤란로 1)", "0/0"),
            building("B동(테헤란로 2)", "0/1"),
        ]));

        let outcome = stage
            .execute(&mut driver, RunId::new(), &chosen())
            .expect("select");

        assert_eq!(outcome.buildings.len(), 2);
        assert!(outcome.detail.is_none());
        assert_eq!(driver.calls().len(), 1);
        assert_eq!(log.terminal_kinds(), [EventKind::BuildingsFound]);
    }

    #[test]
    fn driver_failure_becomes_error_event() {
        let (log, stage) = setup(WorkflowConfig::default());
        let mut driver = ScriptedDriver::new();
        driver.push_buildings(Err(DriverError::ElementNotFound {
            selector: "#dp_navi_4".into(),
        }));

        let err = stage
            .execute(&mut driver, RunId::new(), &chosen())
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::BuildingSelection));
        assert_eq!(log.terminal_kinds(), [EventKind::Error]);
        assert_eq!(log.errors()[0].stage, Stage::BuildingSelection);
    }

    #[test]
    fn failed_auto_crawl_still_reports_the_buildings() {
        let (log, stage) = setup(WorkflowConfig::default());
        let mut driver = ScriptedDriver::new();
        driver.push_buildings(Ok(vec![building("강남빌딩(테헤란로 123)", "0/0")]));
        driver.push_details(Err(DriverError::Timeout {
            what: "detail panel".into(),
            waited: std::time::Duration::from_secs(5),
        }));

        let outcome = stage
            .execute(&mut driver, RunId::new(), &chosen())
            .expect("select");
        assert_eq!(outcome.buildings.len(), 1);
        assert!(matches!(outcome.detail, Some(Err(_))));
        assert_eq!(
            log.terminal_kinds(),
            [EventKind::BuildingsFound, EventKind::Error]
        );
        assert_eq!(log.errors()[0].stage, Stage::DetailCrawl);
    }
}
