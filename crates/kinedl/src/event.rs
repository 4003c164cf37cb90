use std::fmt;

use tokio::sync::mpsc;

use crate::{
    job::{JobId, JobState, Resolution},
    queue::JobQueue,
};

/// Pipeline stages reported after downloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decrypting,
    Merging,
    Done,
}

impl From<Stage> for JobState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Decrypting => JobState::Decrypting,
            Stage::Merging => JobState::Merging,
            Stage::Done => JobState::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&JobState::from(*self), f)
    }
}

/// Everything the worker tells the caller.
///
/// `position` is where the job was in the queue when the event was emitted. It may be
/// stale by the time the event is read; `job` never is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    RunStarted,
    Progress {
        job: JobId,
        position: usize,
        percent: u8,
    },
    Status {
        job: JobId,
        position: usize,
        stage: Stage,
    },
    Failed {
        job: JobId,
        position: usize,
        error: String,
    },
    /// Not sent when the run is cancelled.
    RunFinished { completed: bool },
}

pub type EventSender = mpsc::UnboundedSender<QueueEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<QueueEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Updates one job in the queue and tells the caller about it.
#[derive(Clone)]
pub struct JobReporter {
    queue: JobQueue,
    events: EventSender,
    job: JobId,
}

impl JobReporter {
    pub fn new(queue: JobQueue, events: EventSender, job: JobId) -> Self {
        Self { queue, events, job }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    /// Record the resolution chosen for a job that did not name one.
    pub fn resolution(&self, resolution: Resolution) {
        self.queue.fix_resolution(self.job, resolution);
    }

    pub fn progress(&self, percent: u8) {
        let Some(position) = self.queue.set_progress(self.job, percent) else {
            return;
        };
        self.send(QueueEvent::Progress {
            job: self.job,
            position,
            percent,
        });
    }

    pub fn stage(&self, stage: Stage) {
        let Some(position) = self.queue.set_state(self.job, stage.into()) else {
            return;
        };
        tracing::info!("Job {} at position {position}: {}", self.job, JobState::from(stage));
        self.send(QueueEvent::Status {
            job: self.job,
            position,
            stage,
        });
    }

    pub fn failed(&self, error: &impl ToString) {
        let Some(position) = self.queue.set_state(self.job, JobState::Failed) else {
            return;
        };
        self.send(QueueEvent::Failed {
            job: self.job,
            position,
            error: error.to_string(),
        });
    }

    fn send(&self, event: QueueEvent) {
        // the caller may have stopped listening
        _ = self.events.send(event);
    }
}
