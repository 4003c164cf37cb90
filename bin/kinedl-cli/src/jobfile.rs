//! `.kin` job files.
//!
//! ```json
//! {
//!   "Title": "Lesson 1",
//!   "Quality": "['1920x1080', '1280x720']",
//!   "Quality_selected": "1280x720",
//!   "video_id": "0a1b2c3d",
//!   "referer": "https://example.com/course/1",
//!   "key": "00112233445566778899aabbccddeeff"
//! }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use kinedl::{key::DecryptionKey, JobRequest, Resolution};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct JobFile {
    #[serde(rename = "Title")]
    pub title: Option<String>,

    /// Target resolution, `WIDTHxHEIGHT`. Empty means the configured quality decides.
    #[serde(rename = "Quality_selected", default)]
    pub quality_selected: Option<String>,

    pub video_id: String,

    #[serde(default)]
    pub referer: Option<Url>,

    /// Content key in hex, for videos whose license can not be requested.
    #[serde(default)]
    pub key: Option<String>,
}

impl JobFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// The file stem stands in for a missing title.
    pub fn into_request(self, path: &Path) -> anyhow::Result<JobRequest> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().to_string()))
            .unwrap_or_else(|| self.video_id.clone());

        let mut request = JobRequest::new(title, self.video_id);
        if let Some(referer) = self.referer {
            request = request.referer(referer);
        }
        if let Some(resolution) = self.quality_selected.filter(|q| !q.trim().is_empty()) {
            let resolution: Resolution = resolution.parse().map_err(anyhow::Error::msg)?;
            request = request.resolution(resolution);
        }
        if let Some(key) = self.key.filter(|k| !k.trim().is_empty()) {
            request = request.key(DecryptionKey::from_hex(&key)?);
        }
        Ok(request)
    }
}

pub fn load_all(paths: &[PathBuf]) -> anyhow::Result<Vec<JobRequest>> {
    paths
        .iter()
        .map(|path| {
            JobFile::load(path)
                .and_then(|file| file.into_request(path))
                .with_context(|| format!("Failed to load job file {}", path.display()))
        })
        .collect()
}
