//! Bounded polling for page state.
//!
//! Every read the driver performs goes through [`poll_until`]: the check is
//! retried every `poll_interval` until it reports [`PageState::Ready`] or the
//! budget's `timeout` elapses. The check always runs at least once.

use std::thread;
use std::time::Instant;

use propcrawl_shared::{DriverError, WaitBudget};
use tracing::trace;

/// Page state seen by one check.
#[derive(Debug)]
pub enum PageState<T> {
    /// The page reached the expected state.
    Ready(T),
    /// The page is not there yet.
    Pending,
    /// The page is there but lacks the element matched by this selector.
    MissingElement(&'static str),
}

/// Poll `check` until it is ready or `budget` runs out.
///
/// On timeout, a page that was present but never showed its element is
/// reported as [`DriverError::ElementNotFound`]; anything else is
/// [`DriverError::Timeout`]. Errors returned by the check end the wait
/// immediately.
pub fn poll_until<T>(
    budget: WaitBudget,
    what: &str,
    mut check: impl FnMut() -> Result<PageState<T>, DriverError>,
) -> Result<T, DriverError> {
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last = match check()? {
            PageState::Ready(value) => {
                trace!(what, attempts, elapsed_ms = started.elapsed().as_millis(), "wait satisfied");
                return Ok(value);
            }
            other => other,
        };

        let elapsed = started.elapsed();
        if elapsed >= budget.timeout {
            return Err(match last {
                PageState::MissingElement(selector) => DriverError::ElementNotFound {
                    selector: selector.to_string(),
                },
                _ => DriverError::Timeout {
                    what: what.to_string(),
                    waited: elapsed,
                },
            });
        }

        thread::sleep(budget.poll_interval.min(budget.timeout - elapsed));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn budget(timeout_ms: u64) -> WaitBudget {
        WaitBudget {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn ready_after_a_few_attempts() {
        let mut calls = 0;
        let value = poll_until(budget(1_000), "panel", || {
            calls += 1;
            Ok(if calls < 3 { PageState::Pending } else { PageState::Ready(calls) })
        })
        .expect("ready");
        assert_eq!(value, 3);
    }

    #[test]
    fn pending_page_times_out() {
        let err = poll_until::<()>(budget(30), "address suggestions", || Ok(PageState::Pending))
            .unwrap_err();
        match err {
            DriverError::Timeout { what, waited } => {
                assert_eq!(what, "address suggestions");
                assert!(waited >= Duration::from_millis(30));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn present_page_without_element_is_not_found() {
        let err = poll_until::<()>(budget(20), "detail tabs", || {
            Ok(PageState::MissingElement(".mfs-agent-main-tab-div"))
        })
        .unwrap_err();
        assert!(matches!(err, DriverError::ElementNotFound { selector } if selector == ".mfs-agent-main-tab-div"));
    }

    #[test]
    fn zero_budget_still_checks_once() {
        let value = poll_until(budget(0), "page", || Ok(PageState::Ready("now"))).expect("ready");
        assert_eq!(value, "now");
    }

    #[test]
    fn read_errors_end_the_wait() {
        let mut calls = 0;
        let err = poll_until::<()>(budget(1_000), "page", || {
            calls += 1;
            Err(DriverError::Navigation("unreadable".into()))
        })
        .unwrap_err();
        assert!(matches!(err, DriverError::Navigation(_)));
        assert_eq!(calls, 1);
    }
}
