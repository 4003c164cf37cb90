use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::key::DecryptionKey;

/// Stable identity of a job. Assigned once at submission and never reused, so it
/// survives removals that renumber positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u64,
    pub height: u64,
}

impl Resolution {
    pub const fn new(width: u64, height: u64) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {s:?}"))?;
        let width = width
            .trim()
            .parse()
            .map_err(|_| format!("invalid width in {s:?}"))?;
        let height = height
            .trim()
            .parse()
            .map_err(|_| format!("invalid height in {s:?}"))?;
        Ok(Self { width, height })
    }
}

/// Where the media of a job comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSource {
    pub video_id: String,
    /// Page the video is embedded in. Sent as `Referer` when fetching the manifest.
    pub referer: Option<Url>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Pending,
    Active,
    Decrypting,
    Merging,
    Done,
    /// The run was cancelled before this job started.
    Cancelled,
    Failed,
}

impl JobState {
    /// The pipeline owns the job in these states.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Active | Self::Decrypting | Self::Merging)
    }

    /// Jobs whose target resolution may still change: not started yet, or failed and
    /// waiting for the next run.
    pub fn is_retargetable(self) -> bool {
        matches!(self, Self::Pending | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "downloading",
            Self::Decrypting => "decrypting",
            Self::Merging => "merging",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// What the caller submits.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub title: String,
    pub source: JobSource,
    /// `None` lets the quality preference pick once the manifest is known.
    pub resolution: Option<Resolution>,
    pub key: Option<DecryptionKey>,
}

impl JobRequest {
    pub fn new<T, V>(title: T, video_id: V) -> Self
    where
        T: Into<String>,
        V: Into<String>,
    {
        Self {
            title: title.into(),
            source: JobSource {
                video_id: video_id.into(),
                referer: None,
            },
            resolution: None,
            key: None,
        }
    }

    pub fn referer(mut self, referer: Url) -> Self {
        self.source.referer = Some(referer);
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn key(mut self, key: DecryptionKey) -> Self {
        self.key = Some(key);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub source: JobSource,
    pub resolution: Option<Resolution>,
    pub key: Option<DecryptionKey>,
    pub state: JobState,
    pub progress: u8,
}

impl Job {
    pub(crate) fn from_request(id: JobId, request: JobRequest) -> Self {
        Self {
            id,
            title: request.title,
            source: request.source,
            resolution: request.resolution,
            key: request.key,
            state: JobState::Pending,
            progress: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state != JobState::Done
    }
}
