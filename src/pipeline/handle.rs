use crate::scoring::Results;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Completion future for one scan job.
///
/// Cloneable; every clone observes the same outcome (single-flight
/// requesters share the one handle). Fulfilled exactly once with
/// `Some(results)` on completion or timeout, or `None` when the region
/// was deleted/unowned (benign cancellation, not an error).
#[derive(Clone)]
pub struct ScanHandle {
    shared: Arc<Shared>,
}

struct Shared {
    outcome: Mutex<Option<Option<Results>>>,
    cond: Condvar,
}

impl ScanHandle {
    /// A handle that has not resolved yet
    pub(crate) fn pending() -> Self {
        Self {
            shared: Arc::new(Shared {
                outcome: Mutex::new(None),
                cond: Condvar::new(),
            }),
        }
    }

    /// A handle already resolved, for jobs rejected at admission
    pub(crate) fn resolved(result: Option<Results>) -> Self {
        let handle = Self::pending();
        handle.complete(result);
        handle
    }

    pub(crate) fn complete(&self, result: Option<Results>) {
        let mut outcome = self.shared.outcome.lock();
        if outcome.is_some() {
            log::error!("scan handle completed twice; keeping the first outcome");
            return;
        }
        *outcome = Some(result);
        self.shared.cond.notify_all();
    }

    pub fn is_complete(&self) -> bool {
        self.shared.outcome.lock().is_some()
    }

    /// Outcome if resolved: `Some(None)` means cancelled
    pub fn try_result(&self) -> Option<Option<Results>> {
        self.shared.outcome.lock().clone()
    }

    /// Block until the job resolves
    pub fn wait(&self) -> Option<Results> {
        let mut outcome = self.shared.outcome.lock();
        while outcome.is_none() {
            self.shared.cond.wait(&mut outcome);
        }
        outcome.clone().unwrap_or(None)
    }

    /// Block until the job resolves or `timeout` elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Option<Results>> {
        let mut outcome = self.shared.outcome.lock();
        if outcome.is_none() {
            self.shared.cond.wait_for(&mut outcome, timeout);
        }
        outcome.clone()
    }

    /// True when both handles track the same job
    pub fn same_job(&self, other: &ScanHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_resolved_handle() {
        let handle = ScanHandle::resolved(None);
        assert!(handle.is_complete());
        assert_eq!(handle.try_result(), Some(None));
        assert!(handle.wait().is_none());
    }

    #[test]
    fn test_clones_share_outcome() {
        let handle = ScanHandle::pending();
        let other = handle.clone();
        assert!(handle.same_job(&other));

        let waiter = thread::spawn(move || other.wait());
        handle.complete(Some(Results::new()));
        assert!(waiter.join().unwrap().is_some());
    }

    #[test]
    fn test_second_completion_ignored() {
        let handle = ScanHandle::pending();
        handle.complete(None);
        handle.complete(Some(Results::new()));
        assert_eq!(handle.try_result(), Some(None));
    }

    #[test]
    fn test_wait_timeout_on_pending() {
        let handle = ScanHandle::pending();
        assert!(handle.wait_timeout(Duration::from_millis(10)).is_none());
    }
}
