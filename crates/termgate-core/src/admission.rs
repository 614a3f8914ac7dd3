//! Admission control for concurrent terminal sessions
//!
//! Sessions are admitted against a global ceiling and a per-identity ceiling.
//! The check-then-increment happens in a single critical section so
//! concurrent acquires can never overshoot either limit.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Session ceilings checked on acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionLimits {
    /// Maximum concurrent sessions across all identities
    pub max_total: usize,
    /// Maximum concurrent sessions for a single identity
    pub max_per_identity: usize,
}

/// Point-in-time view of admitted sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionSnapshot {
    /// Total admitted sessions
    pub total: usize,
    /// Admitted sessions per identity
    pub per_identity: BTreeMap<String, usize>,
}

/// Shared admission bookkeeping
///
/// One instance is owned by the composition root and shared by every session.
#[cfg_attr(test, mockall::automock)]
pub trait AdmissionService: Send + Sync {
    /// Admit one session for `identity` if both ceilings allow it
    fn acquire(&self, identity: &str, limits: AdmissionLimits) -> bool;

    /// Give back one session slot for `identity`
    fn release(&self, identity: &str);

    /// Current counts
    fn snapshot(&self) -> AdmissionSnapshot;
}

#[derive(Debug, Default)]
struct AdmissionState {
    total: usize,
    per_identity: HashMap<String, usize>,
}

/// In-process admission controller
#[derive(Debug, Default)]
pub struct AdmissionController {
    state: Mutex<AdmissionState>,
}

impl AdmissionController {
    /// Create a controller with no admitted sessions
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AdmissionState> {
        // counters stay consistent even if a holder panicked
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AdmissionService for AdmissionController {
    fn acquire(&self, identity: &str, limits: AdmissionLimits) -> bool {
        let mut state = self.lock();
        let current = state.per_identity.get(identity).copied().unwrap_or(0);

        if state.total >= limits.max_total || current >= limits.max_per_identity {
            debug!(
                user = %identity,
                total = state.total,
                per_user = current,
                "Admission rejected"
            );
            return false;
        }

        state.total += 1;
        state.per_identity.insert(identity.to_string(), current + 1);
        true
    }

    fn release(&self, identity: &str) {
        let mut state = self.lock();
        let Some(count) = state.per_identity.get_mut(identity) else {
            warn!(user = %identity, "Release for identity with no admitted sessions");
            return;
        };

        *count -= 1;
        if *count == 0 {
            state.per_identity.remove(identity);
        }
        state.total = state.total.saturating_sub(1);
    }

    fn snapshot(&self) -> AdmissionSnapshot {
        let state = self.lock();
        AdmissionSnapshot {
            total: state.total,
            per_identity: state
                .per_identity
                .iter()
                .map(|(identity, count)| (identity.clone(), *count))
                .collect(),
        }
    }
}

/// An admitted session slot, released exactly once
///
/// The slot is returned either by [`AdmissionPermit::release`] or when the
/// permit is dropped, whichever happens first.
pub struct AdmissionPermit {
    service: Arc<dyn AdmissionService>,
    identity: String,
    released: bool,
}

impl AdmissionPermit {
    /// Try to admit a session for `identity`
    #[must_use]
    pub fn try_acquire(
        service: &Arc<dyn AdmissionService>,
        identity: &str,
        limits: AdmissionLimits,
    ) -> Option<Self> {
        service.acquire(identity, limits).then(|| Self {
            service: Arc::clone(service),
            identity: identity.to_string(),
            released: false,
        })
    }

    /// Identity holding this slot
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Return the slot now
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.service.release(&self.identity);
        }
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("identity", &self.identity)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests;
