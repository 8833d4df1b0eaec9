mod support;

use std::time::Duration;

use oai_harvest_core::TransportErrorKind;
use oai_harvest_engine::{FetchSettings, ReqwestTransport, Transport};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(settings: FetchSettings) -> ReqwestTransport {
    ReqwestTransport::new(settings).expect("client builds")
}

#[tokio::test]
async fn returns_body_and_sends_query_parameters() {
    support::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oai"))
        .and(query_param("verb", "Identify"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<OAI-PMH/>", "text/xml; charset=utf-8"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/oai", server.uri());
    let response = transport(FetchSettings::for_oai())
        .fetch(&url, &[("verb".to_string(), "Identify".to_string())])
        .await
        .expect("fetch ok");

    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<OAI-PMH/>".to_vec());
    assert_eq!(response.content_type.as_deref(), Some("text/xml; charset=utf-8"));
    assert!(response.final_url.contains("verb=Identify"));
}

#[tokio::test]
async fn client_errors_are_not_transient() {
    support::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = transport(FetchSettings::default())
        .fetch(&format!("{}/missing.pdf", server.uri()), &[])
        .await
        .expect_err("404 fails");
    assert_eq!(err.kind, TransportErrorKind::Client(404));
    assert!(!err.kind.is_transient());
}

#[tokio::test]
async fn server_errors_carry_retry_after() {
    support::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "3"))
        .mount(&server)
        .await;

    let err = transport(FetchSettings::default())
        .fetch(&server.uri(), &[])
        .await
        .expect_err("503 fails");
    assert_eq!(err.kind, TransportErrorKind::Server(503));
    assert!(err.kind.is_transient());
    assert_eq!(err.retry_after, Some(Duration::from_secs(3)));
}

#[tokio::test]
async fn slow_responses_time_out() {
    support::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<OAI-PMH/>", "text/xml")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(200),
        ..FetchSettings::for_oai()
    };
    let err = transport(settings)
        .fetch(&server.uri(), &[])
        .await
        .expect_err("times out");
    assert_eq!(err.kind, TransportErrorKind::Timeout);
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    support::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'x'; 4096], "application/pdf"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 1024,
        ..FetchSettings::for_pdf()
    };
    let err = transport(settings)
        .fetch(&server.uri(), &[])
        .await
        .expect_err("too large");
    assert_eq!(err.kind, TransportErrorKind::Malformed);
    assert!(err.message.contains("too large"), "{}", err.message);
}

#[tokio::test]
async fn unexpected_content_type_is_rejected() {
    support::init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
        .mount(&server)
        .await;

    let err = transport(FetchSettings::for_oai())
        .fetch(&server.uri(), &[])
        .await
        .expect_err("html is not OAI");
    assert_eq!(err.kind, TransportErrorKind::Malformed);
    assert!(err.message.contains("text/html"));
}
