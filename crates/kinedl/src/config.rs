//! Settings passed into the core by the caller.
//!
//! The core never reads or writes configuration files itself; the binary loads a
//! [`Config`] once at startup and hands it over.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{error::KinedlResult, job::Resolution};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolPaths,

    /// Working directory for downloaded tracks. Wiped after every job.
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,

    #[serde(default)]
    pub quality: QualityPreference,

    #[serde(default)]
    pub endpoints: Endpoints,

    #[serde(default)]
    pub http: HttpOptions,

    /// Attempts per segment before the job fails.
    #[serde(default = "default_segment_attempts")]
    pub segment_attempts: u32,
}

fn default_segment_attempts() -> u32 {
    5
}

impl Config {
    /// Default tools, quality, endpoints and HTTP options.
    pub fn new(temp_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            tools: ToolPaths::default(),
            temp_dir: temp_dir.into(),
            output_dir: output_dir.into(),
            quality: QualityPreference::default(),
            endpoints: Endpoints::default(),
            http: HttpOptions::default(),
            segment_attempts: default_segment_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub mp4decrypt: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            mp4decrypt: PathBuf::from("mp4decrypt"),
        }
    }
}

/// Which resolution to download when a job does not name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreference {
    #[default]
    High,
    Medium,
    Low,
}

impl QualityPreference {
    /// Pick from resolutions sorted by ascending height.
    pub fn select(self, resolutions: &[Resolution]) -> Option<Resolution> {
        let index = match self {
            Self::High => resolutions.len().checked_sub(1)?,
            Self::Medium => resolutions.len().checked_sub(1)? / 2,
            Self::Low => 0,
        };
        resolutions.get(index).copied()
    }
}

/// URL templates of the video platform. `{video_id}` is replaced with the job's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    pub origin: String,
    pub manifest: String,
    pub license: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            origin: "https://kinescope.io".to_string(),
            manifest: "https://kinescope.io/{video_id}/master.mpd".to_string(),
            license: "https://license.kinescope.io/v1/vod/{video_id}/acquire/clearkey?token="
                .to_string(),
        }
    }
}

impl Endpoints {
    pub fn manifest_url(&self, video_id: &str) -> KinedlResult<Url> {
        Ok(Url::parse(&self.manifest.replace("{video_id}", video_id))?)
    }

    pub fn license_url(&self, video_id: &str) -> KinedlResult<Url> {
        Ok(Url::parse(&self.license.replace("{video_id}", video_id))?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOptions {
    /// HTTP timeout, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout() -> u64 {
    30
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            user_agent: None,
        }
    }
}
