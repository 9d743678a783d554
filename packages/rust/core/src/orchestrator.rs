//! End-to-end crawl workflow: query → address → building → details.
//!
//! The [`Orchestrator`] owns the driver session and the minimal transient
//! state needed to move between stages: the current [`RunId`], the address
//! candidates, the chosen address, and the building candidates.
//!
//! ```text
//! Idle ──start_search──▶ AddressesPending ──found/error──▶ Idle
//! Idle ──choose_address──▶ AwaitingBuildingChoice ──none/many/error──▶ Idle
//!                                                 └─one (auto)──▶ DetailPending
//! Idle ──choose_building──▶ DetailPending ──complete──▶ Complete
//!                                         └─error─────▶ Idle
//! Complete ──start_search──▶ AddressesPending (fresh run)
//! ```

use std::sync::Arc;

use propcrawl_shared::{
    Building, CrawlError, CrawlResult, ResolvedAddress, Result, RunId, RunPreset, Stage,
    WorkflowConfig,
};
use tracing::{info, instrument, warn};

use crate::bus::EventBus;
use crate::driver::Driver;
use crate::events::ErrorEvent;
use crate::stages::{AddressSearch, BuildingSelection, DetailCrawl};

/// Where the orchestrator is in the current run.
///
/// There is no failure state: a failed stage leaves the orchestrator in
/// [`Idle`](Self::Idle) with the run's candidates intact, ready for a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    /// Initial state, and the resting state after every non-final terminal event.
    Idle,
    AddressesPending,
    AwaitingBuildingChoice,
    DetailPending,
    /// A result was handed off; only a new search may follow.
    Complete,
}

/// What choosing an address led to.
#[derive(Debug)]
pub enum BuildingChoice {
    /// The address has no buildings; the run cannot continue.
    NoBuildings,
    /// Several candidates; call [`Orchestrator::choose_building`] next.
    Pending(Vec<Building>),
    /// A lone building was crawled automatically.
    Crawled(CrawlResult),
}

/// Sequences the three stages against one driver session.
///
/// One orchestrator per session: the `&mut self` receivers serialize calls,
/// so a run can never overlap another run on the same driver.
pub struct Orchestrator<D: Driver> {
    driver: D,
    bus: Arc<EventBus>,
    address_search: AddressSearch,
    building_selection: BuildingSelection,
    detail_crawl: DetailCrawl,
    workflow: WorkflowConfig,
    state: WorkflowState,
    run: Option<RunId>,
    addresses: Vec<ResolvedAddress>,
    selected_address: Option<ResolvedAddress>,
    buildings: Vec<Building>,
}

impl<D: Driver> Orchestrator<D> {
    pub fn new(driver: D, bus: Arc<EventBus>, workflow: WorkflowConfig) -> Self {
        Self {
            driver,
            address_search: AddressSearch::new(bus.clone()),
            building_selection: BuildingSelection::new(bus.clone(), workflow),
            detail_crawl: DetailCrawl::new(bus.clone()),
            workflow,
            bus,
            state: WorkflowState::Idle,
            run: None,
            addresses: Vec::new(),
            selected_address: None,
            buildings: Vec::new(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// The current run, once a search has been started.
    pub fn run_id(&self) -> Option<RunId> {
        self.run
    }

    /// Address candidates of the current run.
    pub fn addresses(&self) -> &[ResolvedAddress] {
        &self.addresses
    }

    /// Building candidates of the current run.
    pub fn buildings(&self) -> &[Building] {
        &self.buildings
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Begin a new run. All candidates of the previous run are discarded first.
    #[instrument(skip_all, fields(query = %query))]
    pub fn start_search(&mut self, query: &str) -> Result<Vec<ResolvedAddress>> {
        let run = RunId::new();
        self.reset(run);
        info!(%run, timeout_ms = self.driver.wait_budget().timeout.as_millis(), "starting run");

        self.state = WorkflowState::AddressesPending;
        let outcome = self
            .address_search
            .execute(&mut self.driver, run, query);
        self.state = WorkflowState::Idle;

        let addresses = outcome?;
        self.addresses = addresses.clone();
        Ok(addresses)
    }

    /// Resolve buildings for an address from the current run's candidates.
    ///
    /// A lone building is crawled within this call. The state goes straight
    /// from `AwaitingBuildingChoice` to `Complete` (or `Idle` on failure);
    /// `DetailPending` is never observable in between because the call holds
    /// `&mut self` throughout.
    pub fn choose_address(&mut self, address: &ResolvedAddress) -> Result<BuildingChoice> {
        let auto_select = self.workflow.auto_select_single_building;
        self.select_address(address, auto_select)
    }

    #[instrument(skip_all, fields(address = %address.label, auto_select = auto_select))]
    fn select_address(
        &mut self,
        address: &ResolvedAddress,
        auto_select: bool,
    ) -> Result<BuildingChoice> {
        let run = self.check_choice(Stage::BuildingSelection, "address")?;
        if address.run() != Some(run) || !self.addresses.contains(address) {
            return Err(self.reject(CrawlError::StaleCandidate {
                stage: Stage::BuildingSelection,
                message: format!("address '{}' is not a candidate of the current run", address.label),
            }));
        }

        self.buildings.clear();
        self.selected_address = Some(address.clone());
        self.state = WorkflowState::AwaitingBuildingChoice;

        let outcome = match self
            .building_selection
            .execute_with(&mut self.driver, run, address, auto_select)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = WorkflowState::Idle;
                return Err(e);
            }
        };
        self.buildings = outcome.buildings;

        match outcome.detail {
            Some(Ok(result)) => {
                self.state = WorkflowState::Complete;
                Ok(BuildingChoice::Crawled(result))
            }
            Some(Err(e)) => {
                self.state = WorkflowState::Idle;
                Err(e)
            }
            None if self.buildings.is_empty() => {
                self.state = WorkflowState::Idle;
                Ok(BuildingChoice::NoBuildings)
            }
            None => {
                self.state = WorkflowState::Idle;
                Ok(BuildingChoice::Pending(self.buildings.clone()))
            }
        }
    }

    /// [`choose_address`](Self::choose_address) by position in [`addresses`](Self::addresses).
    pub fn choose_address_at(&mut self, index: usize) -> Result<BuildingChoice> {
        self.check_choice(Stage::BuildingSelection, "address")?;
        match self.addresses.get(index).cloned() {
            Some(address) => self.choose_address(&address),
            None => Err(self.reject(CrawlError::InvalidInput {
                stage: Stage::BuildingSelection,
                message: format!(
                    "address index {index} out of range ({} candidates)",
                    self.addresses.len()
                ),
            })),
        }
    }

    /// Crawl a building from the current run's candidates.
    #[instrument(skip_all, fields(building = %building.label))]
    pub fn choose_building(&mut self, building: &Building) -> Result<CrawlResult> {
        let run = self.check_choice(Stage::DetailCrawl, "building")?;
        if building.run() != Some(run) || !self.buildings.contains(building) {
            return Err(self.reject(CrawlError::StaleCandidate {
                stage: Stage::DetailCrawl,
                message: format!("building '{}' is not a candidate of the current run", building.label),
            }));
        }
        let Some(address) = self.selected_address.clone() else {
            return Err(self.reject(CrawlError::InvalidState {
                stage: Stage::DetailCrawl,
                message: "no address has been chosen".into(),
            }));
        };

        self.state = WorkflowState::DetailPending;
        match self
            .detail_crawl
            .execute(&mut self.driver, &address, building)
        {
            Ok(result) => {
                self.state = WorkflowState::Complete;
                Ok(result)
            }
            Err(e) => {
                self.state = WorkflowState::Idle;
                Err(e)
            }
        }
    }

    /// [`choose_building`](Self::choose_building) by position in [`buildings`](Self::buildings).
    pub fn choose_building_at(&mut self, index: usize) -> Result<CrawlResult> {
        self.check_choice(Stage::DetailCrawl, "building")?;
        match self.buildings.get(index).cloned() {
            Some(building) => self.choose_building(&building),
            None => Err(self.reject(CrawlError::InvalidInput {
                stage: Stage::DetailCrawl,
                message: format!(
                    "building index {index} out of range ({} candidates)",
                    self.buildings.len()
                ),
            })),
        }
    }

    /// Run a stored preset end to end, picking candidates by label.
    ///
    /// Without a label the first candidate is taken. When the preset names a
    /// building, a lone candidate is not crawled until its label is checked.
    /// A refused pick is reported against the stage it would have started.
    #[instrument(skip_all, fields(preset = %preset.name))]
    pub fn replay(&mut self, preset: &RunPreset) -> Result<CrawlResult> {
        let addresses = self.start_search(&preset.query)?;
        let Some(address) = pick(&addresses, preset.address.as_deref(), |a| a.label.as_str()) else {
            return Err(self.reject_at(
                Stage::BuildingSelection,
                CrawlError::validation(match &preset.address {
                    Some(label) => format!("no address labelled '{label}' for '{}'", preset.query),
                    None => format!("no address found for '{}'", preset.query),
                }),
            ));
        };
        let address = address.clone();

        let auto_select = preset.building.is_none() && self.workflow.auto_select_single_building;
        let buildings = match self.select_address(&address, auto_select)? {
            BuildingChoice::Crawled(result) => return Ok(result),
            BuildingChoice::NoBuildings => {
                return Err(self.reject_at(
                    Stage::DetailCrawl,
                    CrawlError::validation(format!("no buildings for '{}'", address.label)),
                ));
            }
            BuildingChoice::Pending(buildings) => buildings,
        };

        let Some(building) = pick(&buildings, preset.building.as_deref(), |b| b.label.as_str()) else {
            return Err(self.reject_at(
                Stage::DetailCrawl,
                CrawlError::validation(format!(
                    "no building labelled '{}' for '{}'",
                    preset.building.as_deref().unwrap_or_default(),
                    address.label
                )),
            ));
        };
        let building = building.clone();
        self.choose_building(&building)
    }

    fn reset(&mut self, run: RunId) {
        self.run = Some(run);
        self.addresses.clear();
        self.selected_address = None;
        self.buildings.clear();
        self.state = WorkflowState::Idle;
    }

    /// Current run, if the orchestrator is resting with candidates to choose from.
    fn check_choice(&self, stage: Stage, what: &str) -> Result<RunId> {
        let problem = match (self.state, self.run) {
            (WorkflowState::Idle, Some(run)) => return Ok(run),
            (WorkflowState::Complete, _) => {
                format!("run is complete; start a new search before choosing a {what}")
            }
            (WorkflowState::Idle, None) => format!("no search has been started; cannot choose a {what}"),
            (state, _) => format!("cannot choose a {what} while {state:?}"),
        };
        Err(self.reject(CrawlError::InvalidState {
            stage,
            message: problem,
        }))
    }

    /// Publish the error event for a refused call and return the error.
    fn reject(&self, err: CrawlError) -> CrawlError {
        self.reject_at(err.stage().unwrap_or(Stage::AddressSearch), err)
    }

    fn reject_at(&self, stage: Stage, err: CrawlError) -> CrawlError {
        warn!(%stage, error = %err, "call rejected");
        self.bus.publish(ErrorEvent::from_error(stage, &err));
        err
    }
}

impl<D: Driver> std::fmt::Debug for Orchestrator<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("run", &self.run)
            .field("addresses", &self.addresses.len())
            .field("buildings", &self.buildings.len())
            .finish_non_exhaustive()
    }
}

fn pick<'a, T>(
    candidates: &'a [T],
    label: Option<&str>,
    label_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    match label {
        Some(label) => candidates.iter().find(|c| label_of(c) == label),
        None => candidates.first(),
    }
}
