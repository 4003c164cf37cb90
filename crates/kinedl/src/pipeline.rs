//! Per-job acquisition: download both tracks, decrypt them when the content is
//! protected, mux them into one file and clean up.

use std::path::{Path, PathBuf};

use tokio::{fs::File, io::AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::{Config, Endpoints, QualityPreference},
    dash::{available_resolutions, fetch_manifest, segments_for, Segment},
    decrypt::Decrypter,
    error::{KinedlError, KinedlResult},
    event::{JobReporter, Stage},
    fetch::{fetch_segment, SegmentSource},
    job::{Job, Resolution},
    key::KeyProvider,
    merge::Muxer,
    util::{
        http::HttpClient,
        path::{sanitize_file_name, KinedlPathExt},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    Completed,
    /// The token was cancelled. The job keeps whatever state it reached.
    Cancelled,
}

pub struct TrackPipeline<S, D, M> {
    client: HttpClient,
    source: S,
    keys: KeyProvider,
    decrypter: D,
    muxer: M,

    temp_dir: PathBuf,
    output_dir: PathBuf,
    quality: QualityPreference,
    endpoints: Endpoints,
    segment_attempts: u32,
}

impl<S, D, M> TrackPipeline<S, D, M>
where
    S: SegmentSource + Send + Sync,
    D: Decrypter + Send + Sync,
    M: Muxer + Send + Sync,
{
    pub fn new(config: &Config, client: HttpClient, source: S, decrypter: D, muxer: M) -> Self {
        Self {
            keys: KeyProvider::new(client.clone(), config.endpoints.clone()),
            client,
            source,
            decrypter,
            muxer,
            temp_dir: config.temp_dir.clone(),
            output_dir: config.output_dir.clone(),
            quality: config.quality,
            endpoints: config.endpoints.clone(),
            segment_attempts: config.segment_attempts,
        }
    }

    /// Path of the final file of a job.
    pub fn output_path(&self, job: &Job) -> PathBuf {
        self.output_dir
            .join(format!("{}.mp4", sanitize_file_name(&job.title)))
    }

    pub async fn run(
        &self,
        job: &Job,
        reporter: &JobReporter,
        token: &CancellationToken,
    ) -> KinedlResult<PipelineOutcome> {
        if token.is_cancelled() {
            return Ok(PipelineOutcome::Cancelled);
        }

        let manifest_url = self.endpoints.manifest_url(&job.source.video_id)?;
        let referer = job
            .source
            .referer
            .as_ref()
            .map(Url::as_str)
            .unwrap_or(self.endpoints.origin.as_str());
        let mpd = fetch_manifest(&self.client, &manifest_url, referer).await?;

        let resolution = self.resolve_resolution(job, &mpd, reporter)?;
        let segments = segments_for(&mpd, resolution, &manifest_url)?;
        let key = self.keys.resolve(job, &mpd).await?;
        tracing::info!(
            "Job {} ({}): {} video and {} audio segments at {resolution}{}",
            job.id,
            job.title,
            segments.video.len(),
            segments.audio.len(),
            if key.is_some() { ", encrypted" } else { "" }
        );

        if token.is_cancelled() {
            return Ok(PipelineOutcome::Cancelled);
        }

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let video_path = self
            .temp_dir
            .join(format!("{}_video.mp4", job.source.video_id));
        let audio_path = self
            .temp_dir
            .join(format!("{}_audio.mp4", job.source.video_id));
        let (video_download, audio_download) = if key.is_some() {
            let mut video = video_path.clone();
            video.append_extension("enc");
            let mut audio = audio_path.clone();
            audio.append_extension("enc");
            (video, audio)
        } else {
            (video_path.clone(), audio_path.clone())
        };

        let mut progress = Progress::new(segments.total(), reporter);
        for (track, path) in [
            (&segments.video, &video_download),
            (&segments.audio, &audio_download),
        ] {
            if self.download_track(track, path, &mut progress, token).await?
                == PipelineOutcome::Cancelled
            {
                return Ok(PipelineOutcome::Cancelled);
            }
        }

        if let Some(key) = &key {
            reporter.stage(Stage::Decrypting);
            for (input, output) in [(&video_download, &video_path), (&audio_download, &audio_path)]
            {
                if token.is_cancelled() {
                    return Ok(PipelineOutcome::Cancelled);
                }
                self.decrypter.decrypt(key, input, output).await?;
            }
        }

        if token.is_cancelled() {
            return Ok(PipelineOutcome::Cancelled);
        }
        reporter.stage(Stage::Merging);
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_path(job);
        self.muxer.mux(&video_path, &audio_path, &output).await?;
        tracing::info!("Job {} written to {}", job.id, output.display());

        self.reset_temp_dir().await?;
        reporter.stage(Stage::Done);
        Ok(PipelineOutcome::Completed)
    }

    fn resolve_resolution(
        &self,
        job: &Job,
        mpd: &dash_mpd::MPD,
        reporter: &JobReporter,
    ) -> KinedlResult<Resolution> {
        if let Some(resolution) = job.resolution {
            return Ok(resolution);
        }

        let resolutions = available_resolutions(mpd);
        let resolution = self
            .quality
            .select(&resolutions)
            .ok_or(KinedlError::MissingTrack("video"))?;
        tracing::debug!(
            "Job {} has no resolution, picked {resolution} ({:?}) from {resolutions:?}",
            job.id,
            self.quality
        );
        reporter.resolution(resolution);
        Ok(resolution)
    }

    async fn download_track(
        &self,
        segments: &[Segment],
        path: &Path,
        progress: &mut Progress<'_>,
        token: &CancellationToken,
    ) -> KinedlResult<PipelineOutcome> {
        let mut file = File::create(path).await?;
        for segment in segments {
            fetch_segment(&self.source, segment, &mut file, self.segment_attempts).await?;
            progress.advance();
            if token.is_cancelled() {
                file.flush().await?;
                return Ok(PipelineOutcome::Cancelled);
            }
        }
        file.flush().await?;
        Ok(PipelineOutcome::Completed)
    }

    async fn reset_temp_dir(&self) -> KinedlResult<()> {
        match tokio::fs::remove_dir_all(&self.temp_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        Ok(())
    }
}

/// One bar over the video and audio segments together.
struct Progress<'a> {
    done: usize,
    total: usize,
    reporter: &'a JobReporter,
}

impl<'a> Progress<'a> {
    fn new(total: usize, reporter: &'a JobReporter) -> Self {
        Self {
            done: 0,
            total,
            reporter,
        }
    }

    fn advance(&mut self) {
        self.done += 1;
        let percent = percent(self.done, self.total);
        tracing::debug!("Segment {}/{} ({percent}%)", self.done, self.total);
        self.reporter.progress(percent);
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}
