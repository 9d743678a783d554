//! Driver that reads captured pages of the site from a directory.
//!
//! Layout of a snapshot directory:
//!
//! ```text
//! search.html                           address autocomplete panel
//! buildings-<address>.html              building list for one address
//! detail-<address>-<position>.html      detail tabs for one building
//! ```
//!
//! Pages may appear while a wait is in progress (e.g. written by a capture
//! tool); every read polls until the page and its container are present.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use propcrawl_core::Driver;
use propcrawl_shared::{
    AddressQuery, Building, CrawlItem, DriverError, ResolvedAddress, WaitBudget,
};
use scraper::Html;
use tracing::{debug, info, instrument};

use crate::parser::{parse_addresses, parse_buildings, parse_details};
use crate::wait::{PageState, poll_until};

const SEARCH_PAGE: &str = "search.html";

pub struct SnapshotDriver {
    root: PathBuf,
    budget: WaitBudget,
}

impl SnapshotDriver {
    /// Open a session over the snapshot directory at `root`.
    pub fn open(root: impl Into<PathBuf>, budget: WaitBudget) -> Result<Self, DriverError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(DriverError::Session(format!(
                "snapshot directory not found: {}",
                root.display()
            )));
        }
        info!(root = %root.display(), timeout_ms = budget.timeout.as_millis(), "snapshot session opened");
        Ok(Self { root, budget })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wait for `file` to exist and satisfy `extract`.
    fn read_page<T>(
        &self,
        file: &str,
        what: &str,
        extract: impl Fn(&Html) -> PageState<T>,
    ) -> Result<T, DriverError> {
        let path = self.root.join(file);
        debug!(page = %path.display(), "waiting for page");

        poll_until(self.budget, what, || {
            if !self.root.is_dir() {
                return Err(DriverError::Session(format!(
                    "snapshot directory disappeared: {}",
                    self.root.display()
                )));
            }
            match fs::read_to_string(&path) {
                Ok(content) => Ok(extract(&Html::parse_document(&content))),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(PageState::Pending),
                Err(e) => Err(DriverError::Navigation(format!(
                    "failed to read {}: {e}",
                    path.display()
                ))),
            }
        })
    }
}

impl std::fmt::Debug for SnapshotDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotDriver")
            .field("root", &self.root)
            .field("budget", &self.budget)
            .finish()
    }
}

/// Reject locators that could name a file outside the snapshot directory.
fn check_segment(locator: &str, segment: &str) -> Result<(), DriverError> {
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(DriverError::Navigation(format!("unusable locator '{locator}'")))
    }
}

impl Driver for SnapshotDriver {
    /// Every query reads the same `search.html`; the query text is only
    /// recorded on the span.
    #[instrument(skip_all, fields(query = %query))]
    fn search_address(&mut self, query: &AddressQuery) -> Result<Vec<ResolvedAddress>, DriverError> {
        self.read_page(SEARCH_PAGE, "address suggestions", |doc| {
            match parse_addresses(doc) {
                Some(addresses) => PageState::Ready(addresses),
                None => PageState::MissingElement(".ds-autocomplete-suggestions"),
            }
        })
    }

    #[instrument(skip_all, fields(address = %address.locator))]
    fn search_buildings(&mut self, address: &ResolvedAddress) -> Result<Vec<Building>, DriverError> {
        let locator = address.locator.as_str();
        check_segment(locator, locator)?;

        self.read_page(&format!("buildings-{locator}.html"), "building list", |doc| {
            PageState::Ready(parse_buildings(doc, locator))
        })
    }

    #[instrument(skip_all, fields(building = %building.locator))]
    fn extract_details(&mut self, building: &Building) -> Result<Vec<CrawlItem>, DriverError> {
        let locator = building.locator.as_str();
        let Some((address, position)) = locator.split_once('/') else {
            return Err(DriverError::Navigation(format!(
                "building locator '{locator}' has no address part"
            )));
        };
        check_segment(locator, address)?;
        check_segment(locator, position)?;

        self.read_page(
            &format!("detail-{address}-{position}.html"),
            "detail tabs",
            |doc| match parse_details(doc) {
                Some(items) => PageState::Ready(items),
                None => PageState::MissingElement(".mfs-agent-main-tab-div"),
            },
        )
    }

    fn wait_budget(&self) -> WaitBudget {
        self.budget
    }

    fn set_wait_budget(&mut self, budget: WaitBudget) {
        self.budget = budget;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use propcrawl_core::{BuildingChoice, EventBus, Orchestrator, WorkflowState};
    use propcrawl_shared::{MISSING_VALUE, RunId, WorkflowConfig};

    use super::*;

    const FIXTURES: &str = "../../../fixtures/html";

    fn budget(timeout_ms: u64) -> WaitBudget {
        WaitBudget {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn fixtures() -> SnapshotDriver {
        SnapshotDriver::open(FIXTURES, budget(200)).expect("fixture dir")
    }

    /// Scratch directory removed on drop.
    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new() -> Self {
            let path = std::env::temp_dir().join(format!("propcrawl-driver-{}", RunId::new()));
            fs::create_dir_all(&path).expect("create scratch dir");
            Self(path)
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    fn query(q: &str) -> AddressQuery {
        AddressQuery::parse(q).expect("query")
    }

    #[test]
    fn reads_every_panel_from_fixtures() {
        let mut driver = fixtures();

        let addresses = driver.search_address(&query("강남구")).expect("addresses");
        assert_eq!(addresses.len(), 3);

        let buildings = driver.search_buildings(&addresses[1]).expect("buildings");
        assert_eq!(buildings.len(), 2);
        assert_eq!(buildings[1].locator, "1/1");

        let items = driver.extract_details(&buildings[1]).expect("details");
        assert!(items.iter().any(|i| i.title == "주용도"));
    }

    #[test]
    fn every_query_reads_the_same_search_page() {
        let mut driver = fixtures();
        let gangnam = driver.search_address(&query("강남구")).expect("addresses");
        let busan = driver.search_address(&query("부산시 해운대구")).expect("addresses");
        assert_eq!(gangnam, busan);
    }

    #[test]
    fn address_without_buildings_is_empty() {
        let mut driver = fixtures();
        let buildings = driver
            .search_buildings(&ResolvedAddress::new("서울특별시 강남구 논현로 508", "2"))
            .expect("buildings");
        assert!(buildings.is_empty());
    }

    #[test]
    fn missing_page_times_out() {
        let mut driver = fixtures();
        let err = driver
            .extract_details(&Building::new("없는 건물(0)", "9/9"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Timeout { .. }), "{err:?}");
    }

    #[test]
    fn page_without_container_is_element_not_found() {
        let dir = ScratchDir::new();
        fs::write(dir.0.join("search.html"), "<html><body><p>검색 중</p></body></html>")
            .expect("write page");

        let mut driver = SnapshotDriver::open(&dir.0, budget(30)).expect("open");
        let err = driver.search_address(&query("강남구")).unwrap_err();
        assert!(matches!(err, DriverError::ElementNotFound { .. }), "{err:?}");
    }

    #[test]
    fn page_written_during_wait_is_picked_up() {
        let dir = ScratchDir::new();
        let page = dir.0.join("detail-0-0.html");
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(40));
            fs::write(
                page,
                r#"<div class="mfs-agent-main-tab-div">
                     <div class="ifs-tab-txt">층수</div>
                     <div class="ifs-tab-txt rfc-dusk"></div>
                   </div>"#,
            )
            .expect("write page");
        });

        let mut driver = SnapshotDriver::open(&dir.0, budget(2_000)).expect("open");
        let items = driver
            .extract_details(&Building::new("A(1)", "0/0"))
            .expect("details");
        writer.join().expect("writer");
        assert_eq!(items, [CrawlItem::new("층수", MISSING_VALUE)]);
    }

    #[test]
    fn missing_directory_is_a_session_error() {
        let err = SnapshotDriver::open("/nonexistent/propcrawl/snapshots", budget(10)).unwrap_err();
        assert!(matches!(err, DriverError::Session(_)));
    }

    #[test]
    fn locators_cannot_escape_the_directory() {
        let mut driver = fixtures();
        let err = driver
            .search_buildings(&ResolvedAddress::new("x", "../secret"))
            .unwrap_err();
        assert!(matches!(err, DriverError::Navigation(_)));

        let err = driver.extract_details(&Building::new("x", "0")).unwrap_err();
        assert!(matches!(err, DriverError::Navigation(_)));
    }

    #[test]
    fn orchestrated_run_over_fixtures() {
        let bus = Arc::new(EventBus::new());
        let mut orch = Orchestrator::new(fixtures(), bus, WorkflowConfig::default());

        orch.start_search("서울특별시 강남구").expect("search");
        let choice = orch.choose_address_at(0).expect("choose address");
        let BuildingChoice::Crawled(result) = choice else {
            panic!("single building should be crawled automatically: {choice:?}");
        };
        assert_eq!(result.address, "서울특별시 강남구 테헤란로 152 / 역삼동 737");
        assert_eq!(result.building, "강남파이낸스센터(테헤란로 152) [업무시설]");
        assert_eq!(result.items.len(), 4);
        assert_eq!(orch.state(), WorkflowState::Complete);
    }
}
