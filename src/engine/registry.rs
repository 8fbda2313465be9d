use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::job::JobId;

#[derive(Debug)]
struct LiveJob {
    cancelled: bool,
    owner: Option<String>,
    /// Identifies the claim that created this entry
    token: u64,
}

/// Process-wide table of live jobs and their cancellation flags.
///
/// Holds an entry for a job only while it is pending or running. The lock
/// is never held across an await point.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    jobs: Mutex<HashMap<JobId, LiveJob>>,
    next_token: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, LiveJob>> {
        // A panic while holding the lock cannot leave a flag half-written.
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `job_id` for a new live job. `owner` identifies the connection
    /// that submitted it.
    ///
    /// Returns the claim token, or `None` when the id is already live.
    pub fn try_register(&self, job_id: &JobId, owner: Option<&str>) -> Option<u64> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        match self.lock().entry(job_id.clone()) {
            Entry::Occupied(_) => {
                warn!(%job_id, "Job id already live; registration refused");
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(LiveJob {
                    cancelled: false,
                    owner: owner.map(str::to_owned),
                    token,
                });
                debug!(%job_id, ?owner, "Job registered");
                Some(token)
            }
        }
    }

    /// Flag a live job as cancelled.
    ///
    /// Returns `true` only for the request that flips the flag. Unknown,
    /// finished or already-flagged jobs yield `false` and nothing changes.
    pub fn request_cancel(&self, job_id: &JobId) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(job_id) {
            Some(entry) if !entry.cancelled => {
                entry.cancelled = true;
                debug!(%job_id, "Cancellation requested");
                true
            }
            Some(_) => false,
            None => {
                debug!(%job_id, "Cancellation for unknown job ignored");
                false
            }
        }
    }

    pub fn is_cancelled(&self, job_id: &JobId) -> bool {
        self.lock()
            .get(job_id)
            .map(|entry| entry.cancelled)
            .unwrap_or(false)
    }

    pub fn is_live(&self, job_id: &JobId) -> bool {
        self.lock().contains_key(job_id)
    }

    /// Remove the entry created by the claim `token`; a newer claim on the
    /// same id is left alone.
    pub fn unregister(&self, job_id: &JobId, token: u64) -> bool {
        let mut jobs = self.lock();
        match jobs.get(job_id) {
            Some(entry) if entry.token == token => {
                jobs.remove(job_id);
                debug!(%job_id, "Job unregistered");
                true
            }
            _ => false,
        }
    }

    /// Flag every live job submitted by `owner`; used when a connection drops
    pub fn cancel_owned_by(&self, owner: &str) -> Vec<JobId> {
        let mut jobs = self.lock();
        let mut flagged = Vec::new();
        for (job_id, entry) in jobs.iter_mut() {
            if entry.owner.as_deref() == Some(owner) && !entry.cancelled {
                entry.cancelled = true;
                flagged.push(job_id.clone());
            }
        }
        flagged
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }
}

/// Keeps a job registered until released or dropped.
///
/// The engine releases it explicitly on the transition to a terminal state;
/// dropping it (a panicking or aborted job task) releases it as well.
#[derive(Debug)]
pub struct Registration {
    registry: Arc<CancellationRegistry>,
    job_id: JobId,
    token: u64,
    active: bool,
}

impl Registration {
    /// Claim `job_id`, or `None` if a live job already holds it
    pub fn claim(registry: Arc<CancellationRegistry>, job_id: JobId, owner: Option<&str>) -> Option<Self> {
        let token = registry.try_register(&job_id, owner)?;
        Some(Self {
            registry,
            job_id,
            token,
            active: true,
        })
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.registry.is_cancelled(&self.job_id)
    }

    pub fn release(&mut self) {
        if self.active {
            self.registry.unregister(&self.job_id, self.token);
            self.active = false;
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}
