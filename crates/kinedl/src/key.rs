//! Content keys and the ClearKey license exchange.

use std::fmt;

use dash_mpd::{ContentProtection, MPD};
use reqwest::header::ORIGIN;
use serde::{Deserialize, Serialize};

use crate::{
    config::Endpoints,
    error::{KinedlError, KinedlResult},
    job::Job,
    util::{
        base64::{base64_decode, base64_encode},
        http::HttpClient,
    },
};

/// A 16-byte content key as accepted by `mp4decrypt --key`.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptionKey(Vec<u8>);

impl DecryptionKey {
    pub fn new(key: Vec<u8>) -> Self {
        Self(key)
    }

    pub fn from_hex(key: &str) -> KinedlResult<Self> {
        let key = key.trim();
        if key.is_empty() {
            return Err(KinedlError::InvalidHexKey(key.to_string()));
        }
        let bytes = hex::decode(key).map_err(|_| KinedlError::InvalidHexKey(key.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DecryptionKey").field(&self.to_hex()).finish()
    }
}

fn first_protections(mpd: &MPD) -> impl Iterator<Item = &ContentProtection> {
    let adaptation = mpd
        .periods
        .first()
        .and_then(|period| period.adaptations.first());
    adaptation.into_iter().flat_map(|adaptation| {
        adaptation.ContentProtection.iter().chain(
            adaptation
                .representations
                .first()
                .into_iter()
                .flat_map(|r| r.ContentProtection.iter()),
        )
    })
}

/// Key id advertised by the first adaptation set, either on the set itself or on its
/// first representation.
pub fn default_kid(mpd: &MPD) -> Option<&str> {
    first_protections(mpd)
        .filter_map(|protection| protection.default_KID.as_deref())
        .find(|kid| !kid.trim().is_empty())
}

/// Whether the first adaptation set (or its first representation) carries any
/// content protection descriptor.
pub fn is_protected(mpd: &MPD) -> bool {
    first_protections(mpd).next().is_some()
}

#[derive(Serialize)]
struct LicenseRequest {
    kids: Vec<String>,
    #[serde(rename = "type")]
    license_type: &'static str,
}

#[derive(Deserialize)]
struct LicenseResponse {
    keys: Vec<LicenseKey>,
}

#[derive(Deserialize)]
struct LicenseKey {
    k: String,
}

/// Obtains the content key of a job.
#[derive(Clone)]
pub struct KeyProvider {
    client: HttpClient,
    endpoints: Endpoints,
}

impl KeyProvider {
    pub fn new(client: HttpClient, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// A key supplied with the job wins. Otherwise the manifest's key id is exchanged
    /// for a key at the license server. Unprotected manifests yield `None`; a protected
    /// one without a key id is an error.
    pub async fn resolve(&self, job: &Job, mpd: &MPD) -> KinedlResult<Option<DecryptionKey>> {
        if let Some(key) = &job.key {
            tracing::debug!("Using key supplied with job {}", job.id);
            return Ok(Some(key.clone()));
        }

        let Some(kid) = default_kid(mpd) else {
            if is_protected(mpd) {
                return Err(KinedlError::LicenseRequest(
                    "protected manifest has no default_KID".to_string(),
                ));
            }
            tracing::debug!("Manifest of job {} is not protected", job.id);
            return Ok(None);
        };
        self.request_key(&job.source.video_id, kid).await.map(Some)
    }

    async fn request_key(&self, video_id: &str, kid: &str) -> KinedlResult<DecryptionKey> {
        let kid_bytes = hex::decode(kid.trim().replace('-', ""))
            .map_err(|e| KinedlError::LicenseRequest(format!("malformed key id {kid}: {e}")))?;
        let url = self.endpoints.license_url(video_id)?;
        tracing::info!("Requesting key {kid} for {video_id}");

        let response = self
            .client
            .post(url)
            .header(ORIGIN, &self.endpoints.origin)
            .json(&LicenseRequest {
                kids: vec![base64_encode(&kid_bytes)],
                license_type: "temporary",
            })
            .send()
            .await
            .map_err(|e| KinedlError::LicenseRequest(e.to_string()))?;
        if !response.status().is_success() {
            return Err(KinedlError::LicenseRequest(format!(
                "license server returned {}",
                response.status()
            )));
        }

        let license: LicenseResponse = response
            .json()
            .await
            .map_err(|e| KinedlError::LicenseRequest(e.to_string()))?;
        let key = license
            .keys
            .first()
            .ok_or_else(|| KinedlError::LicenseRequest("license contains no keys".to_string()))?;
        let key = base64_decode(&key.k)
            .map_err(|e| KinedlError::LicenseRequest(format!("malformed key: {e}")))?;
        Ok(DecryptionKey::new(key))
    }
}
