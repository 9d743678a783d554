//! Scripted driver and event recorder shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use propcrawl_shared::{
    AddressQuery, Building, CrawlItem, DriverError, ResolvedAddress, WaitBudget,
};

use crate::bus::EventBus;
use crate::driver::Driver;
use crate::events::{CrawlEvent, ErrorEvent, EventKind};

pub(crate) fn address(label: &str, locator: &str) -> ResolvedAddress {
    ResolvedAddress::new(label, locator)
}

pub(crate) fn building(label: &str, locator: &str) -> Building {
    Building::new(label, locator)
}

/// One recorded driver call, keyed by query text or locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DriverCall {
    SearchAddress(String),
    SearchBuildings(String),
    ExtractDetails(String),
}

/// Driver that replays queued responses and records every call.
/// An exhausted queue answers with an empty list.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDriver {
    addresses: VecDeque<Result<Vec<ResolvedAddress>, DriverError>>,
    buildings: VecDeque<Result<Vec<Building>, DriverError>>,
    details: VecDeque<Result<Vec<CrawlItem>, DriverError>>,
    calls: Vec<DriverCall>,
    budget: WaitBudget,
}

impl ScriptedDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_addresses(&mut self, response: Result<Vec<ResolvedAddress>, DriverError>) {
        self.addresses.push_back(response);
    }

    pub(crate) fn push_buildings(&mut self, response: Result<Vec<Building>, DriverError>) {
        self.buildings.push_back(response);
    }

    pub(crate) fn push_details(&mut self, response: Result<Vec<CrawlItem>, DriverError>) {
        self.details.push_back(response);
    }

    pub(crate) fn calls(&self) -> &[DriverCall] {
        &self.calls
    }
}

impl Driver for ScriptedDriver {
    fn search_address(&mut self, query: &AddressQuery) -> Result<Vec<ResolvedAddress>, DriverError> {
        self.calls
            .push(DriverCall::SearchAddress(query.as_str().to_string()));
        self.addresses.pop_front().unwrap_or(Ok(Vec::new()))
    }

    fn search_buildings(&mut self, address: &ResolvedAddress) -> Result<Vec<Building>, DriverError> {
        self.calls
            .push(DriverCall::SearchBuildings(address.locator.clone()));
        self.buildings.pop_front().unwrap_or(Ok(Vec::new()))
    }

    fn extract_details(&mut self, building: &Building) -> Result<Vec<CrawlItem>, DriverError> {
        self.calls
            .push(DriverCall::ExtractDetails(building.locator.clone()));
        self.details.pop_front().unwrap_or(Ok(Vec::new()))
    }

    fn wait_budget(&self) -> WaitBudget {
        self.budget
    }

    fn set_wait_budget(&mut self, budget: WaitBudget) {
        self.budget = budget;
    }
}

/// Records every event published on a bus.
#[derive(Clone)]
pub(crate) struct EventLog {
    events: Arc<Mutex<Vec<CrawlEvent>>>,
}

impl EventLog {
    pub(crate) fn attach(bus: &EventBus) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe_all(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });
        Self { events }
    }

    pub(crate) fn events(&self) -> Vec<CrawlEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(CrawlEvent::kind).collect()
    }

    pub(crate) fn terminal_kinds(&self) -> Vec<EventKind> {
        self.events()
            .iter()
            .filter(|e| e.is_terminal())
            .map(CrawlEvent::kind)
            .collect()
    }

    pub(crate) fn last_terminal(&self) -> Option<CrawlEvent> {
        self.events().into_iter().filter(CrawlEvent::is_terminal).last()
    }

    pub(crate) fn errors(&self) -> Vec<ErrorEvent> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                CrawlEvent::Error(error) => Some(error),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}
