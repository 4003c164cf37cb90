use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU8, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use bytes::Bytes;
use kinedl::{
    config::Endpoints,
    dash::Segment,
    decrypt::Decrypter,
    event::EventReceiver,
    fetch::SegmentSource,
    key::DecryptionKey,
    merge::Muxer,
    Config, KinedlError, KinedlResult, QueueEvent,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, Request, ResponseTemplate,
};

pub const CLEAR_MPD: &str = include_str!("../fixtures/clear.mpd");
pub const ENCRYPTED_MPD: &str = include_str!("../fixtures/encrypted.mpd");
pub const BYTE_RANGES_MPD: &str = include_str!("../fixtures/byte_ranges.mpd");
/// Same tracks as [`ENCRYPTED_MPD`], with protection descriptors that carry no key id.
pub const PROTECTED_NO_KID_MPD: &str = include_str!("../fixtures/protected_no_kid.mpd");

/// Content key returned by [`mount_license`].
pub const LICENSE_KEY: &str = "00112233445566778899aabbccddeeff";

/// Mock of the video platform: manifests at `/{video_id}/master.mpd`, segments
/// anywhere else answering with their own path as body.
pub struct MockPlatform {
    pub server: MockServer,
}

impl MockPlatform {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"\.(mp4|m4s)$"))
            .respond_with(|request: &Request| {
                ResponseTemplate::new(200).set_body_string(request.url.path().to_string())
            })
            .mount(&server)
            .await;
        Self { server }
    }

    pub async fn mount_manifest(&self, video_id: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/{video_id}/master.mpd")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_license(&self, video_id: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/license/{video_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "keys": [{ "kty": "oct", "k": "ABEiM0RVZneImaq7zN3u_w", "kid": "ChssPU5fYHGCk6S1xtfo-Q" }],
                "type": "temporary",
            })))
            .mount(&self.server)
            .await;
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            origin: "https://kinescope.io".to_string(),
            manifest: format!("{}/{{video_id}}/master.mpd", self.server.uri()),
            license: format!("{}/license/{{video_id}}", self.server.uri()),
        }
    }

    /// Body served for a segment of `video_id` at `relative` path.
    pub fn segment_body(video_id: &str, relative: &[&str]) -> Vec<u8> {
        relative
            .iter()
            .map(|r| format!("/{video_id}/{r}"))
            .collect::<String>()
            .into_bytes()
    }
}

pub struct Workspace {
    pub temp: TempDir,
    pub output: TempDir,
}

impl Workspace {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
            output: tempfile::tempdir()?,
        })
    }

    pub fn config(&self, endpoints: Endpoints) -> Config {
        let mut config = Config::new(self.temp.path(), self.output.path().join("videos"));
        config.endpoints = endpoints;
        config.segment_attempts = 2;
        config
    }
}

pub fn drain(events: &mut EventReceiver) -> Vec<QueueEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

/// Fails transiently a fixed number of times, then answers with the segment URL.
#[derive(Clone)]
pub struct FlakySource {
    failures: Arc<AtomicU8>,
    calls: Arc<AtomicUsize>,
    transient: bool,
}

impl FlakySource {
    pub fn new(failures: u8) -> Self {
        Self {
            failures: Arc::new(AtomicU8::new(failures)),
            calls: Arc::new(AtomicUsize::new(0)),
            transient: true,
        }
    }

    /// Fails with an HTTP status instead, which is never retried.
    pub fn rejecting() -> Self {
        Self {
            transient: false,
            ..Self::new(u8::MAX)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl SegmentSource for FlakySource {
    async fn fetch_bytes(&self, segment: &Segment) -> KinedlResult<Bytes> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let failing = self
            .failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if !failing {
            return Ok(Bytes::from(segment.url.to_string()));
        }

        if self.transient {
            Err(KinedlError::IOError(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed before message completed",
            )))
        } else {
            Err(KinedlError::HttpError(reqwest::StatusCode::FORBIDDEN))
        }
    }
}

/// Serves segments without network and runs `hook` with the number of segments fetched
/// so far, after each one.
pub struct HookSource {
    fetched: AtomicUsize,
    hook: Box<dyn Fn(usize) + Send + Sync>,
}

impl HookSource {
    pub fn new(hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        Self {
            fetched: AtomicUsize::new(0),
            hook: Box::new(hook),
        }
    }
}

impl SegmentSource for HookSource {
    async fn fetch_bytes(&self, segment: &Segment) -> KinedlResult<Bytes> {
        let fetched = self.fetched.fetch_add(1, Ordering::SeqCst) + 1;
        (self.hook)(fetched);
        Ok(Bytes::from(segment.url.path().to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct DecryptCall {
    pub key: String,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// "Decrypts" by copying.
#[derive(Clone, Default)]
pub struct CopyDecrypter {
    pub calls: Arc<Mutex<Vec<DecryptCall>>>,
    cancel: Option<CancellationToken>,
}

impl CopyDecrypter {
    /// Cancels `token` after the first track is decrypted.
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            calls: Arc::default(),
            cancel: Some(token),
        }
    }

    pub fn calls(&self) -> Vec<DecryptCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Decrypter for CopyDecrypter {
    async fn decrypt(&self, key: &DecryptionKey, input: &Path, output: &Path) -> KinedlResult<()> {
        tokio::fs::copy(input, output).await?;
        self.calls.lock().unwrap().push(DecryptCall {
            key: key.to_hex(),
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });
        if let Some(token) = &self.cancel {
            token.cancel();
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MuxCall {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
    pub video_bytes: Vec<u8>,
    pub audio_bytes: Vec<u8>,
}

/// Records its inputs and writes them one after the other into the output.
#[derive(Clone, Default)]
pub struct RecordingMuxer {
    pub calls: Arc<Mutex<Vec<MuxCall>>>,
}

impl RecordingMuxer {
    pub fn calls(&self) -> Vec<MuxCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Muxer for RecordingMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> KinedlResult<()> {
        let video_bytes = tokio::fs::read(video).await?;
        let audio_bytes = tokio::fs::read(audio).await?;
        tokio::fs::write(output, [video_bytes.as_slice(), audio_bytes.as_slice()].concat()).await?;

        self.calls.lock().unwrap().push(MuxCall {
            video: video.to_path_buf(),
            audio: audio.to_path_buf(),
            output: output.to_path_buf(),
            video_bytes,
            audio_bytes,
        });
        Ok(())
    }
}
