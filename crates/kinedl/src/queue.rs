//! The shared, ordered job list.
//!
//! Every operation takes the lock once, mutates or copies what it needs and releases it
//! before returning, so the caller can mutate the queue while the worker is running
//! without either side blocking on I/O held by the other.
//!
//! There is no stored "pending" list. A position is pending iff the job at that position
//! is not [`JobState::Done`], which keeps the pending set consistent across any mix of
//! appends and removals.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::job::{Job, JobId, JobRequest, JobState, Resolution};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("No job at position {0}")]
    NoSuchPosition(usize),

    #[error("Job at position {position} has already started ({state})")]
    NotPending { position: usize, state: JobState },

    #[error("Job at position {position} is {state} and can not be removed while running")]
    InFlight { position: usize, state: JobState },

    #[error("A run is already in progress")]
    AlreadyRunning,
}

/// Result of a batch removal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// Removed jobs, in the order they were processed (highest position first).
    pub removed: Vec<JobId>,
    pub rejected: Vec<QueueError>,
}

/// A job handed to the worker by [`JobQueue::claim_next`].
#[derive(Debug, Clone)]
pub(crate) struct Claim {
    pub position: usize,
    pub job: Job,
}

#[derive(Default)]
struct QueueInner {
    jobs: Vec<Job>,
    next_id: u64,
    running: bool,
}

impl QueueInner {
    fn position_of(&self, id: JobId) -> Option<usize> {
        self.jobs.iter().position(|job| job.id == id)
    }

    fn job_mut(&mut self, id: JobId) -> Option<(usize, &mut Job)> {
        self.jobs
            .iter_mut()
            .enumerate()
            .find(|(_, job)| job.id == id)
    }
}

#[derive(Clone, Default)]
pub struct JobQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        // A panic while holding the lock can not leave the vector half-mutated:
        // every mutation is a single Vec operation or field store.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append jobs to the end of the queue. New jobs are pending.
    pub fn append<I>(&self, requests: I) -> Vec<JobId>
    where
        I: IntoIterator<Item = JobRequest>,
    {
        let mut inner = self.lock();
        let mut ids = Vec::new();
        for request in requests {
            let id = JobId(inner.next_id);
            inner.next_id += 1;
            inner.jobs.push(Job::from_request(id, request));
            ids.push(id);
        }
        tracing::debug!("{} job(s) appended, queue length {}", ids.len(), inner.jobs.len());
        ids
    }

    /// Remove jobs by position.
    ///
    /// Positions are processed from highest to lowest, so every position in the batch
    /// refers to the queue as it was when the call was made.
    pub fn remove(&self, positions: &[usize]) -> RemoveOutcome {
        let mut positions = positions.to_vec();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions.dedup();

        let mut inner = self.lock();
        let mut outcome = RemoveOutcome::default();
        for position in positions {
            let Some(job) = inner.jobs.get(position) else {
                outcome.rejected.push(QueueError::NoSuchPosition(position));
                continue;
            };
            if inner.running && job.state.is_in_flight() {
                outcome.rejected.push(QueueError::InFlight {
                    position,
                    state: job.state,
                });
                continue;
            }
            let job = inner.jobs.remove(position);
            outcome.removed.push(job.id);
        }
        outcome
    }

    /// Change the target resolution of a job that has not started yet, or that failed
    /// and will be retried by the next run.
    pub fn set_resolution(&self, position: usize, resolution: Resolution) -> Result<(), QueueError> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get_mut(position)
            .ok_or(QueueError::NoSuchPosition(position))?;
        if !job.state.is_retargetable() {
            return Err(QueueError::NotPending {
                position,
                state: job.state,
            });
        }
        job.resolution = Some(resolution);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<Job> {
        self.lock().jobs.get(position).cloned()
    }

    pub fn position_of(&self, id: JobId) -> Option<usize> {
        self.lock().position_of(id)
    }

    /// Copy of every job in queue order.
    pub fn snapshot(&self) -> Vec<Job> {
        self.lock().jobs.clone()
    }

    /// Positions of all jobs that are not done yet, ascending.
    pub fn pending_positions(&self) -> Vec<usize> {
        self.lock()
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.is_pending())
            .map(|(position, _)| position)
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Mark the queue as being processed and re-arm every unfinished job.
    pub(crate) fn begin_run(&self) -> Result<(), QueueError> {
        let mut inner = self.lock();
        if inner.running {
            return Err(QueueError::AlreadyRunning);
        }
        inner.running = true;
        for job in inner.jobs.iter_mut() {
            if job.state != JobState::Done && job.state != JobState::Pending {
                job.state = JobState::Pending;
                job.progress = 0;
            }
        }
        Ok(())
    }

    /// Hand the first pending job to the worker and mark it active.
    pub(crate) fn claim_next(&self) -> Option<Claim> {
        let mut inner = self.lock();
        let (position, job) = inner
            .jobs
            .iter_mut()
            .enumerate()
            .find(|(_, job)| job.state == JobState::Pending)?;
        job.state = JobState::Active;
        job.progress = 0;
        Some(Claim {
            position,
            job: job.clone(),
        })
    }

    /// Returns the current position of the job, or `None` if it is gone.
    pub(crate) fn set_state(&self, id: JobId, state: JobState) -> Option<usize> {
        let mut inner = self.lock();
        let (position, job) = inner.job_mut(id)?;
        job.state = state;
        if state == JobState::Done {
            job.progress = 100;
        }
        Some(position)
    }

    pub(crate) fn set_progress(&self, id: JobId, percent: u8) -> Option<usize> {
        let mut inner = self.lock();
        let (position, job) = inner.job_mut(id)?;
        job.progress = percent;
        Some(position)
    }

    /// Record the resolution picked for a job that is already running.
    pub(crate) fn fix_resolution(&self, id: JobId, resolution: Resolution) {
        if let Some((_, job)) = self.lock().job_mut(id) {
            job.resolution = Some(resolution);
        }
    }

    pub(crate) fn end_run(&self, cancelled: bool) {
        let mut inner = self.lock();
        inner.running = false;
        if cancelled {
            for job in inner.jobs.iter_mut() {
                if job.state == JobState::Pending {
                    job.state = JobState::Cancelled;
                }
            }
        }
    }
}
