use std::future::Future;

use bytes::Bytes;
use reqwest::header::RANGE;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::{
    dash::Segment,
    error::{KinedlError, KinedlResult},
    util::http::HttpClient,
};

/// Where segment bodies come from.
pub trait SegmentSource {
    /// Fetch the whole body of one segment.
    fn fetch_bytes(&self, segment: &Segment) -> impl Future<Output = KinedlResult<Bytes>> + Send;
}

impl SegmentSource for HttpClient {
    async fn fetch_bytes(&self, segment: &Segment) -> KinedlResult<Bytes> {
        let mut request = self.get(segment.url.clone());
        if let Some(byte_range) = segment.byte_range {
            request = request.header(RANGE, byte_range.header_value());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            if let Ok(body) = response.text().await {
                tracing::warn!("Error body: {body}");
            }
            return Err(KinedlError::HttpError(status));
        }

        Ok(response.bytes().await?)
    }
}

/// Fetch one segment and append it to `writer`.
///
/// Transient failures are retried immediately until `attempts` tries have been made.
/// Each body is buffered in full before it is written, so a failed attempt leaves
/// nothing behind in `writer`.
pub async fn fetch_segment<S, W>(
    source: &S,
    segment: &Segment,
    writer: &mut W,
    attempts: u32,
) -> KinedlResult<()>
where
    S: SegmentSource,
    W: AsyncWrite + Unpin,
{
    let attempts = attempts.max(1);
    let mut attempt = 0;
    let bytes = loop {
        attempt += 1;
        match source.fetch_bytes(segment).await {
            Ok(bytes) => break bytes,
            Err(e) if e.is_transient() => {
                if attempt >= attempts {
                    tracing::error!(
                        "Fetching {} failed, max attempts exceeded. {e}",
                        segment.url
                    );
                    return Err(KinedlError::SegmentDownload {
                        url: segment.url.to_string(),
                    });
                }
                tracing::warn!(
                    "Fetching {} failed ({attempt}/{attempts}), retrying. {e}",
                    segment.url
                );
            }
            Err(e) => return Err(e),
        }
    };

    writer.write_all(&bytes).await?;
    Ok(())
}
