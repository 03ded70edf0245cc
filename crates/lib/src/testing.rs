//! Fault injection shared by the in-memory collaborators.
//!
//! The in-memory token store, SSH agent, Git config and environment all accept a
//! [`FailAfter`] so tests can make the *n*-th mutating call fail. This is how
//! apply failures, rollback failures and timeouts are provoked without touching
//! real agents or config files.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Lets the first `n` calls through, then fails every later call.
///
/// Disarmed by default (never fails).
#[derive(Debug)]
pub struct FailAfter {
    remaining: AtomicUsize,
}

impl FailAfter {
    const DISARMED: usize = usize::MAX;

    /// Never fails.
    pub fn disarmed() -> Self {
        Self {
            remaining: AtomicUsize::new(Self::DISARMED),
        }
    }

    /// Allow `n` more successful calls, then fail.
    pub fn arm(&self, n: usize) {
        self.remaining.store(n, Ordering::SeqCst);
    }

    /// Stop failing.
    pub fn disarm(&self) {
        self.remaining.store(Self::DISARMED, Ordering::SeqCst);
    }

    /// Record a call; returns `true` if this call must fail.
    pub fn trip(&self) -> bool {
        let mut current = self.remaining.load(Ordering::SeqCst);
        loop {
            if current == Self::DISARMED {
                return false;
            }
            if current == 0 {
                return true;
            }
            match self.remaining.compare_exchange(
                current,
                current - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return false,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for FailAfter {
    fn default() -> Self {
        Self::disarmed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_never_trips() {
        let faults = FailAfter::disarmed();
        assert!((0..100).all(|_| !faults.trip()));
    }

    #[test]
    fn armed_lets_n_through() {
        let faults = FailAfter::disarmed();
        faults.arm(2);
        assert!(!faults.trip());
        assert!(!faults.trip());
        assert!(faults.trip());
        assert!(faults.trip());
        faults.disarm();
        assert!(!faults.trip());
    }
}
