use std::borrow::Cow;

use dash_mpd::MPD;
use reqwest::header::{ACCEPT, REFERER};
use url::Url;

use crate::{
    error::{KinedlError, KinedlResult},
    util::http::HttpClient,
};

/// The platform occasionally emits `...="PT10S""minBufferTime="PT2S"`, which no XML
/// parser accepts. Dropping the stray quote restores the attribute list.
pub fn repair_manifest(text: &str) -> Cow<'_, str> {
    const BROKEN: &str = "\"minBufferTime";
    if text.contains(BROKEN) {
        tracing::debug!("Repairing stray quote before minBufferTime");
        Cow::Owned(text.replace(BROKEN, " minBufferTime"))
    } else {
        Cow::Borrowed(text)
    }
}

pub async fn fetch_manifest(client: &HttpClient, url: &Url, referer: &str) -> KinedlResult<MPD> {
    tracing::debug!("Fetching manifest {url}");
    let response = client
        .get(url.clone())
        .header(REFERER, referer)
        .header(ACCEPT, "application/dash+xml,video/vnd.mpeg.dash.mpd")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(KinedlError::HttpError(response.status()));
    }

    let text = response.text().await?;
    let mpd = dash_mpd::parse(&repair_manifest(&text))?;
    Ok(mpd)
}
