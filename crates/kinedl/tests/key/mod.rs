use kinedl::{
    key::{default_kid, is_protected, DecryptionKey, KeyProvider},
    HttpClient, Job, JobQueue, JobRequest, KinedlError,
};
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, ResponseTemplate,
};

use crate::support::{
    MockPlatform, CLEAR_MPD, ENCRYPTED_MPD, LICENSE_KEY, PROTECTED_NO_KID_MPD,
};

fn job(request: JobRequest) -> Job {
    let queue = JobQueue::new();
    queue.append([request]);
    queue.get(0).unwrap()
}

#[test]
fn test_default_kid() -> anyhow::Result<()> {
    let mpd = dash_mpd::parse(ENCRYPTED_MPD)?;
    assert_eq!(
        default_kid(&mpd),
        Some("0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9")
    );
    assert!(is_protected(&mpd));

    let mpd = dash_mpd::parse(CLEAR_MPD)?;
    assert_eq!(default_kid(&mpd), None);
    assert!(!is_protected(&mpd));

    let mpd = dash_mpd::parse(PROTECTED_NO_KID_MPD)?;
    assert_eq!(default_kid(&mpd), None);
    assert!(is_protected(&mpd));
    Ok(())
}

#[tokio::test]
async fn test_license_exchange() -> anyhow::Result<()> {
    let platform = MockPlatform::start().await;
    Mock::given(method("POST"))
        .and(path("/license/abc"))
        .and(header("origin", "https://kinescope.io"))
        .and(body_json(serde_json::json!({
            "kids": ["ChssPU5fYHGCk6S1xtfo+Q"],
            "type": "temporary",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "keys": [{ "kty": "oct", "k": "ABEiM0RVZneImaq7zN3u_w", "kid": "ChssPU5fYHGCk6S1xtfo-Q" }],
            "type": "temporary",
        })))
        .expect(1)
        .mount(&platform.server)
        .await;

    let provider = KeyProvider::new(HttpClient::default(), platform.endpoints());
    let mpd = dash_mpd::parse(ENCRYPTED_MPD)?;
    let key = provider
        .resolve(&job(JobRequest::new("Lesson", "abc")), &mpd)
        .await?;

    assert_eq!(key, Some(DecryptionKey::from_hex(LICENSE_KEY)?));
    Ok(())
}

#[tokio::test]
async fn test_unprotected_manifest_has_no_key() -> anyhow::Result<()> {
    let platform = MockPlatform::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&platform.server)
        .await;

    let provider = KeyProvider::new(HttpClient::default(), platform.endpoints());
    let mpd = dash_mpd::parse(CLEAR_MPD)?;
    let key = provider
        .resolve(&job(JobRequest::new("Lesson", "abc")), &mpd)
        .await?;

    assert_eq!(key, None);
    Ok(())
}

#[tokio::test]
async fn test_static_key_skips_license_server() -> anyhow::Result<()> {
    let platform = MockPlatform::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&platform.server)
        .await;

    let provider = KeyProvider::new(HttpClient::default(), platform.endpoints());
    let mpd = dash_mpd::parse(ENCRYPTED_MPD)?;
    let static_key = DecryptionKey::from_hex("ffeeddccbbaa99887766554433221100")?;
    let key = provider
        .resolve(
            &job(JobRequest::new("Lesson", "abc").key(static_key.clone())),
            &mpd,
        )
        .await?;

    assert_eq!(key, Some(static_key));
    Ok(())
}

#[tokio::test]
async fn test_license_failure() -> anyhow::Result<()> {
    let platform = MockPlatform::start().await;
    Mock::given(method("POST"))
        .and(path("/license/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&platform.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/license/def"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&platform.server)
        .await;

    let provider = KeyProvider::new(HttpClient::default(), platform.endpoints());
    let mpd = dash_mpd::parse(ENCRYPTED_MPD)?;

    for video_id in ["abc", "def"] {
        let error = provider
            .resolve(&job(JobRequest::new("Lesson", video_id)), &mpd)
            .await
            .unwrap_err();
        assert!(matches!(error, KinedlError::LicenseRequest(_)), "{error}");
    }
    Ok(())
}

#[tokio::test]
async fn test_protected_manifest_without_key_id() -> anyhow::Result<()> {
    let platform = MockPlatform::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&platform.server)
        .await;

    let provider = KeyProvider::new(HttpClient::default(), platform.endpoints());
    let mpd = dash_mpd::parse(PROTECTED_NO_KID_MPD)?;
    let error = provider
        .resolve(&job(JobRequest::new("Lesson", "abc")), &mpd)
        .await
        .unwrap_err();
    assert!(
        matches!(&error, KinedlError::LicenseRequest(message) if message.contains("default_KID")),
        "{error}"
    );

    // a key supplied with the job still works
    let static_key = DecryptionKey::from_hex(LICENSE_KEY)?;
    let key = provider
        .resolve(
            &job(JobRequest::new("Lesson", "abc").key(static_key.clone())),
            &mpd,
        )
        .await?;
    assert_eq!(key, Some(static_key));
    Ok(())
}
