//! Queue-driven downloader for DASH videos with optional ClearKey protection.
//!
//! ```text
//!  caller ──enqueue/remove/set_resolution──► JobQueue ◄──claim/update── QueueWorker
//!     ▲                                                                     │
//!     └───────────────────── QueueEvent ◄──── JobReporter ◄──── TrackPipeline
//!                                                                           │
//!                       manifest ─► key ─► segments ─► mp4decrypt ─► ffmpeg ┘
//! ```

pub mod config;
pub mod dash;
pub mod decrypt;
pub mod error;
pub mod event;
pub mod fetch;
pub mod job;
pub mod key;
pub mod merge;
pub mod pipeline;
pub mod queue;
pub mod util;
pub mod worker;

pub use config::Config;
pub use error::{KinedlError, KinedlResult};
pub use event::{QueueEvent, Stage};
pub use job::{Job, JobId, JobRequest, JobState, Resolution};
pub use queue::JobQueue;
pub use util::http::HttpClient;
pub use worker::{QueueWorker, RunOutcome, WorkerHandle};
