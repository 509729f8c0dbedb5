// tests/http_client.rs
use std::time::Duration;

use feed_importer::error::HttpError;
use feed_importer::http::{HttpClient, ReqwestHttpClient, RequestOptions};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn returns_status_body_and_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(header("accept", "application/rss+xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/rss+xml")
                .set_body_string("<rss/>"),
        )
        .mount(&server)
        .await;

    let client = ReqwestHttpClient::new("feed-importer-test").unwrap();
    let opts = RequestOptions::with_timeout(Duration::from_secs(5)).header("Accept", "application/rss+xml");
    let resp = client.get(&format!("{}/feed", server.uri()), &opts).await.unwrap();

    assert_eq!(resp.status, 200);
    assert!(resp.is_success());
    assert_eq!(resp.content_type.as_deref(), Some("application/rss+xml"));
    assert_eq!(resp.text(), "<rss/>");
}

#[tokio::test]
async fn non_2xx_is_a_response_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ReqwestHttpClient::new("feed-importer-test").unwrap();
    let resp = client
        .get(
            &format!("{}/missing", server.uri()),
            &RequestOptions::with_timeout(Duration::from_secs(5)),
        )
        .await
        .unwrap();
    assert_eq!(resp.status, 404);
    assert!(!resp.is_success());
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = ReqwestHttpClient::new("feed-importer-test").unwrap();
    let err = client
        .get(
            &format!("{}/slow", server.uri()),
            &RequestOptions::with_timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "{err:?}");
}
