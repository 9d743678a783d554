//! The Driver Capability: the browser-automation boundary the stages call.
//!
//! Implementations own one browser session and every page interaction:
//! locating elements, reading their text, and waiting for client-side
//! rendering to settle. Each operation blocks until the page reaches the
//! expected state or the implementation's [`WaitBudget`] runs out.

use propcrawl_shared::{AddressQuery, Building, CrawlItem, DriverError, ResolvedAddress, WaitBudget};

/// Page interactions needed by the three crawl stages.
///
/// Candidates returned by a driver are unstamped; the stages stamp them with
/// the current run before handing them out.
pub trait Driver {
    /// Type `query` into the site's address search and collect the suggestions.
    fn search_address(&mut self, query: &AddressQuery) -> Result<Vec<ResolvedAddress>, DriverError>;

    /// Select `address` and collect the buildings listed for it.
    fn search_buildings(&mut self, address: &ResolvedAddress) -> Result<Vec<Building>, DriverError>;

    /// Open `building` and extract its detail fields once the panel has rendered.
    fn extract_details(&mut self, building: &Building) -> Result<Vec<CrawlItem>, DriverError>;

    /// Upper bound applied to every wait inside the operations above.
    fn wait_budget(&self) -> WaitBudget;

    /// Replace the wait budget for subsequent operations.
    fn set_wait_budget(&mut self, budget: WaitBudget);
}

impl<D: Driver + ?Sized> Driver for Box<D> {
    fn search_address(&mut self, query: &AddressQuery) -> Result<Vec<ResolvedAddress>, DriverError> {
        (**self).search_address(query)
    }

    fn search_buildings(&mut self, address: &ResolvedAddress) -> Result<Vec<Building>, DriverError> {
        (**self).search_buildings(address)
    }

    fn extract_details(&mut self, building: &Building) -> Result<Vec<CrawlItem>, DriverError> {
        (**self).extract_details(building)
    }

    fn wait_budget(&self) -> WaitBudget {
        (**self).wait_budget()
    }

    fn set_wait_budget(&mut self, budget: WaitBudget) {
        (**self).set_wait_budget(budget)
    }
}
