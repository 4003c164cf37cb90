//! The background loop that drains the queue one job at a time.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    decrypt::Decrypter,
    error::{KinedlError, KinedlResult},
    event::{EventSender, JobReporter, QueueEvent},
    fetch::SegmentSource,
    job::{JobId, JobRequest, Resolution},
    merge::Muxer,
    pipeline::{PipelineOutcome, TrackPipeline},
    queue::{JobQueue, QueueError, RemoveOutcome},
};

#[derive(Debug)]
pub enum RunOutcome {
    /// No pending job was left.
    Completed,
    Cancelled,
    /// A configuration error stopped the run; later jobs would fail the same way.
    Aborted(KinedlError),
}

pub struct QueueWorker<S, D, M> {
    queue: JobQueue,
    pipeline: Arc<TrackPipeline<S, D, M>>,
    events: EventSender,
    token: CancellationToken,
}

impl<S, D, M> QueueWorker<S, D, M>
where
    S: SegmentSource + Send + Sync + 'static,
    D: Decrypter + Send + Sync + 'static,
    M: Muxer + Send + Sync + 'static,
{
    pub fn new(queue: JobQueue, pipeline: TrackPipeline<S, D, M>, events: EventSender) -> Self {
        Self {
            queue,
            pipeline: Arc::new(pipeline),
            events,
            token: CancellationToken::new(),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Another worker over the same queue, pipeline and event channel, with a fresh
    /// token. A cancelled token stays cancelled, so each run after a cancellation needs
    /// one of these.
    pub fn next_run(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            pipeline: self.pipeline.clone(),
            events: self.events.clone(),
            token: CancellationToken::new(),
        }
    }

    /// Process every pending job in queue order, including jobs appended while running.
    ///
    /// Fails only if another run on the same queue is in progress.
    pub async fn run(&self) -> KinedlResult<RunOutcome> {
        self.queue.begin_run()?;
        self.send(QueueEvent::RunStarted);

        let outcome = self.run_jobs().await;
        self.queue.end_run(matches!(outcome, RunOutcome::Cancelled));

        match &outcome {
            RunOutcome::Completed => {
                tracing::info!("All jobs processed");
                self.send(QueueEvent::RunFinished { completed: true });
            }
            RunOutcome::Aborted(e) => {
                tracing::error!("Run aborted: {e}");
                self.send(QueueEvent::RunFinished { completed: false });
            }
            RunOutcome::Cancelled => tracing::info!("Run cancelled"),
        }
        Ok(outcome)
    }

    async fn run_jobs(&self) -> RunOutcome {
        loop {
            if self.token.is_cancelled() {
                return RunOutcome::Cancelled;
            }
            let Some(claim) = self.queue.claim_next() else {
                return RunOutcome::Completed;
            };

            let job = claim.job;
            tracing::info!(
                "Starting job {} at position {}: {}",
                job.id,
                claim.position,
                job.title
            );
            let reporter = JobReporter::new(self.queue.clone(), self.events.clone(), job.id);

            let pipeline = self.pipeline.clone();
            let token = self.token.clone();
            let task_reporter = reporter.clone();
            let task = tokio::spawn(async move { pipeline.run(&job, &task_reporter, &token).await });
            let result = task
                .await
                .unwrap_or_else(|e| Err(KinedlError::TaskPanicked(e.to_string())));

            match result {
                Ok(PipelineOutcome::Completed) => {}
                Ok(PipelineOutcome::Cancelled) => return RunOutcome::Cancelled,
                Err(e) if e.is_fatal() => {
                    reporter.failed(&e);
                    return RunOutcome::Aborted(e);
                }
                Err(e) => {
                    tracing::error!("Job {} failed: {e}", reporter.job());
                    reporter.failed(&e);
                }
            }
        }
    }

    /// Run on a background task. The returned handle carries the queue commands.
    pub fn spawn(self) -> WorkerHandle {
        let queue = self.queue.clone();
        let token = self.token.clone();
        let join = tokio::spawn(async move { self.run().await });
        WorkerHandle { queue, token, join }
    }

    fn send(&self, event: QueueEvent) {
        _ = self.events.send(event);
    }
}

pub struct WorkerHandle {
    queue: JobQueue,
    token: CancellationToken,
    join: JoinHandle<KinedlResult<RunOutcome>>,
}

impl WorkerHandle {
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    pub fn enqueue<I>(&self, requests: I) -> Vec<JobId>
    where
        I: IntoIterator<Item = JobRequest>,
    {
        self.queue.append(requests)
    }

    pub fn remove_jobs(&self, positions: &[usize]) -> RemoveOutcome {
        self.queue.remove(positions)
    }

    pub fn set_resolution(&self, position: usize, resolution: Resolution) -> Result<(), QueueError> {
        self.queue.set_resolution(position, resolution)
    }

    /// Ask the worker to stop. Returns immediately; `join` to wait for it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> KinedlResult<RunOutcome> {
        self.await
    }
}

/// Resolves once the run is over. Like a `JoinHandle`, it must not be polled again
/// after that; the queue commands stay usable.
impl Future for WorkerHandle {
    type Output = KinedlResult<RunOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.join).poll(cx).map(|result| {
            result.unwrap_or_else(|e| Err(KinedlError::TaskPanicked(e.to_string())))
        })
    }
}
