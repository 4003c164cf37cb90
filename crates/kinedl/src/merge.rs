use std::{
    future::Future,
    path::{Path, PathBuf},
};

use tokio::process::Command;

use crate::{
    error::KinedlResult,
    util::process::{locate_tool, run_tool},
};

pub trait Muxer {
    /// Combine one video and one audio track into `output` without re-encoding.
    fn mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> impl Future<Output = KinedlResult<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    path: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn locate(path: impl AsRef<Path>) -> KinedlResult<Self> {
        Ok(Self::new(locate_tool("ffmpeg", path.as_ref())?))
    }
}

impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> KinedlResult<()> {
        tracing::debug!("Merging with ffmpeg CLI...");

        let mut command = Command::new(&self.path);
        command
            .args(["-y", "-loglevel", "error"])
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-map", "0", "-map", "1", "-c", "copy"])
            .arg(output);
        run_tool("ffmpeg", &self.path, &mut command).await
    }
}
