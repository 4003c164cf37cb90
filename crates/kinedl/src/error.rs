use std::{io::ErrorKind, path::PathBuf};

use thiserror::Error;

use crate::{job::Resolution, queue::QueueError};

#[derive(Error, Debug)]
pub enum KinedlError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Failed to download segment {url}")]
    SegmentDownload { url: String },

    #[error("Invalid resolution specified: {0}")]
    InvalidResolution(Resolution),

    #[error("No {0} track found in manifest")]
    MissingTrack(&'static str),

    #[error("Representation {0} has no segment list")]
    MissingSegmentList(String),

    #[error("Invalid byte range: {0}")]
    InvalidByteRange(String),

    #[error("{tool} binary was not found at the specified path: {}", path.display())]
    ToolNotFound { tool: &'static str, path: PathBuf },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("License request failed: {0}")]
    LicenseRequest(String),

    #[error("Invalid hex key: {0}")]
    InvalidHexKey(String),

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    HexDecodeError(#[from] hex::FromHexError),

    #[error(transparent)]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    MpdParseError(#[from] dash_mpd::DashMpdError),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl KinedlError {
    /// Configuration errors: every later job would fail the same way.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ToolNotFound { .. })
    }

    /// Failures worth another attempt on the same segment.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestError(e) => e.is_body() || e.is_decode() || e.is_timeout(),
            Self::IOError(e) => matches!(
                e.kind(),
                ErrorKind::UnexpectedEof
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

pub type KinedlResult<T> = Result<T, KinedlError>;
