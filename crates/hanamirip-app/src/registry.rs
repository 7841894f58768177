//! In-memory job table with per-job exclusive access.
//!
//! The map lock only guards lookup, insert and removal. Every job lives in its
//! own `tokio::sync::Mutex` which callers hold across engine and filesystem
//! awaits. An empty slot is a tombstone: either `start` has not filled it yet
//! (and still holds its lock) or the job was deleted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use hanamirip_transfer_core::{Job, JobId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{JobError, JobResult};

/// Exclusive access to one job slot.
pub type SlotGuard = OwnedMutexGuard<JobSlot>;

/// Storage cell for a single job.
#[derive(Debug, Default)]
pub struct JobSlot {
    job: Option<Job>,
}

impl JobSlot {
    /// The job, or [`JobError::NotFound`] for a tombstone.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] when the slot is empty.
    pub fn job(&self, job_id: JobId) -> JobResult<&Job> {
        match &self.job {
            Some(job) => Ok(job),
            None => Err(JobError::NotFound { job_id }),
        }
    }

    /// Mutable access to the job, or [`JobError::NotFound`] for a tombstone.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] when the slot is empty.
    pub fn job_mut(&mut self, job_id: JobId) -> JobResult<&mut Job> {
        self.job.as_mut().ok_or(JobError::NotFound { job_id })
    }

    pub(crate) fn fill(&mut self, job: Job) {
        self.job = Some(job);
    }

    pub(crate) fn clear(&mut self) -> Option<Job> {
        self.job.take()
    }
}

/// Authoritative table of jobs for this process.
#[derive(Debug)]
pub struct JobRegistry {
    next_id: AtomicU64,
    slots: RwLock<HashMap<JobId, Arc<Mutex<JobSlot>>>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    /// Empty registry; the first id handed out is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_first_id(1)
    }

    /// Empty registry handing out ids from `first` (at least `1`).
    #[must_use]
    pub fn with_first_id(first: u64) -> Self {
        Self {
            next_id: AtomicU64::new(first.max(1)),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate a fresh id and insert an empty slot whose lock the caller already holds.
    ///
    /// Anyone else looking the id up waits until the guard is dropped.
    pub async fn reserve(&self) -> (JobId, SlotGuard) {
        let job_id = JobId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(Mutex::new(JobSlot::default()));
        let guard = Arc::clone(&slot).lock_owned().await;
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id, slot);
        (job_id, guard)
    }

    /// Lock the slot for `job_id`.
    ///
    /// The returned slot may turn out to be a tombstone if the job was deleted
    /// while the caller waited; use [`JobSlot::job`] to find out.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] when no slot is registered under `job_id`.
    pub async fn lock(&self, job_id: JobId) -> JobResult<SlotGuard> {
        let slot = self.slot(job_id).ok_or(JobError::NotFound { job_id })?;
        Ok(slot.lock_owned().await)
    }

    /// Whether a slot is registered under `job_id`.
    #[must_use]
    pub fn contains(&self, job_id: JobId) -> bool {
        self.read().contains_key(&job_id)
    }

    /// Drop the slot from the table. Callers clear it first while holding its lock.
    pub fn discard(&self, job_id: JobId) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id);
    }

    /// Registered ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered slots, reserved ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no slot is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn slot(&self, job_id: JobId) -> Option<Arc<Mutex<JobSlot>>> {
        self.read().get(&job_id).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Arc<Mutex<JobSlot>>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    use chrono::Utc;
    use hanamirip_transfer_core::{EngineAdmission, EngineHandle};
    use tokio::time::{Duration, timeout};

    fn sample_job(job_id: JobId) -> Job {
        Job::admitted(
            job_id,
            "magnet:?xt=urn:btih:abc",
            EngineAdmission {
                handle: EngineHandle::new(job_id.get()),
                info_hash: "abc".into(),
                name: None,
                output_folder: PathBuf::from(format!("/work/{job_id}")),
            },
            PathBuf::from("/library"),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let registry = JobRegistry::new();
        let (first, _a) = registry.reserve().await;
        let (second, _b) = registry.reserve().await;
        assert_eq!(first, JobId::new(1));
        assert_eq!(second, JobId::new(2));
        assert_eq!(registry.ids(), vec![first, second]);
    }

    #[tokio::test]
    async fn first_id_can_skip_past_leftover_folders() {
        let registry = JobRegistry::with_first_id(8);
        assert_eq!(registry.reserve().await.0, JobId::new(8));
        assert_eq!(JobRegistry::with_first_id(0).reserve().await.0, JobId::new(1));
    }

    #[tokio::test]
    async fn concurrent_reservations_never_share_an_id() {
        let registry = Arc::new(JobRegistry::new());
        let mut tasks = Vec::new();
        for _ in 0..64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move { registry.reserve().await.0 }));
        }
        let mut seen = HashSet::new();
        for task in tasks {
            let id = task.await.expect("reservation task");
            assert!(seen.insert(id), "duplicate id {id}");
        }
        assert_eq!(registry.len(), 64);
    }

    #[tokio::test]
    async fn reserved_slot_blocks_other_lockers() {
        let registry = JobRegistry::new();
        let (job_id, mut guard) = registry.reserve().await;

        assert!(
            timeout(Duration::from_millis(50), registry.lock(job_id))
                .await
                .is_err(),
            "lock must wait for the reservation"
        );

        guard.fill(sample_job(job_id));
        drop(guard);
        let guard = registry.lock(job_id).await.expect("slot registered");
        assert_eq!(guard.job(job_id).expect("filled").id, job_id);
    }

    #[tokio::test]
    async fn cleared_slots_read_as_not_found() {
        let registry = JobRegistry::new();
        let (job_id, mut guard) = registry.reserve().await;
        guard.fill(sample_job(job_id));
        drop(guard);

        let mut guard = registry.lock(job_id).await.expect("slot registered");
        assert!(guard.clear().is_some());
        registry.discard(job_id);
        assert!(matches!(
            guard.job(job_id),
            Err(JobError::NotFound { .. })
        ));
        drop(guard);

        assert!(!registry.contains(job_id));
        assert!(matches!(
            registry.lock(job_id).await,
            Err(JobError::NotFound { .. })
        ));
        assert!(registry.is_empty());
    }
}
