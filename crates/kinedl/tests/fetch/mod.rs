use kinedl::{
    dash::Segment,
    fetch::{fetch_segment, SegmentSource},
    util::range::ByteRange,
    HttpClient, KinedlError,
};
use url::Url;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{support::FlakySource, ResultAssert};

fn segment(url: &str) -> Segment {
    Segment {
        url: Url::parse(url).unwrap(),
        byte_range: None,
    }
}

#[tokio::test]
async fn test_fetch_segment_succeeds_on_last_attempt() -> anyhow::Result<()> {
    let source = FlakySource::new(4);
    let segment = segment("https://example.com/abc/video/1.m4s");
    let mut output = Vec::new();

    fetch_segment(&source, &segment, &mut output, 5).await?;

    assert_eq!(source.calls(), 5);
    assert_eq!(output, b"https://example.com/abc/video/1.m4s");
    Ok(())
}

#[tokio::test]
async fn test_fetch_segment_gives_up_after_attempts() -> anyhow::Result<()> {
    let source = FlakySource::new(5);
    let segment = segment("https://example.com/abc/video/1.m4s");
    let mut output = Vec::new();

    let error = fetch_segment(&source, &segment, &mut output, 5)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        KinedlError::SegmentDownload { ref url } if url == "https://example.com/abc/video/1.m4s"
    ));
    assert_eq!(source.calls(), 5);
    assert!(output.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_fetch_segment_does_not_retry_http_errors() -> anyhow::Result<()> {
    let source = FlakySource::rejecting();
    let mut output = Vec::new();

    let error = fetch_segment(&source, &segment("https://example.com/1.m4s"), &mut output, 5)
        .await
        .unwrap_err();

    assert!(matches!(error, KinedlError::HttpError(status) if status.as_u16() == 403));
    assert_eq!(source.calls(), 1);
    assert!(output.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_http_source_sends_range() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/video.mp4"))
        .and(header("range", "bytes=800-1799"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![7u8; 1000]))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::default();
    let segment = Segment {
        url: Url::parse(&format!("{}/media/video.mp4", server.uri()))?,
        byte_range: Some(ByteRange::new(800, Some(1000))),
    };
    let bytes = client.fetch_bytes(&segment).await.assert_ok();
    assert_eq!(bytes.len(), 1000);
    Ok(())
}

#[tokio::test]
async fn test_http_source_reports_status() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.m4s"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::default();
    let segment = segment(&format!("{}/gone.m4s", server.uri()));
    let mut output = Vec::new();
    let error = fetch_segment(&client, &segment, &mut output, 5)
        .await
        .unwrap_err();

    assert!(matches!(error, KinedlError::HttpError(status) if status.as_u16() == 404));
    Ok(())
}
