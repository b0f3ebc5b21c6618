use std::time::Duration;

use pretty_assertions::assert_eq;
use scrapeqa_client::{RemoteService, ReqwestService, ServiceSettings, SESSION_HEADER};
use scrapeqa_core::{AskRequest, ClientError, RemoveUrlRequest, ScrapeRequest};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_for(server: &MockServer) -> ReqwestService {
    ReqwestService::new(&ServiceSettings {
        api_base_url: server.uri(),
        ..ServiceSettings::default()
    })
    .expect("service")
}

#[tokio::test]
async fn scrape_posts_urls_and_returns_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/scrape"))
        .and(body_json(json!({
            "urls": ["https://a.example/"],
            "use_playwright": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": "u1",
            "message": "Successfully scraped 1 URL"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let request = ScrapeRequest {
        urls: vec!["https://a.example/".to_string()],
        use_enhanced_rendering: true,
    };
    let response = service
        .scrape(&request, None, &CancellationToken::new())
        .await
        .expect("scrape ok");

    assert_eq!(response.session_id.as_deref(), Some("u1"));
    assert_eq!(response.message, "Successfully scraped 1 URL");
}

#[tokio::test]
async fn known_session_is_sent_as_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .and(header(SESSION_HEADER, "u1"))
        .and(body_json(json!({ "question": "What is X?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "X is Y",
            "source_documents": ["https://a.example/"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let request = AskRequest {
        question: "What is X?".to_string(),
    };
    let response = service
        .ask(&request, Some("u1"), &CancellationToken::new())
        .await
        .expect("ask ok");

    assert_eq!(response.answer, "X is Y");
    assert_eq!(response.source_documents, vec!["https://a.example/".to_string()]);
}

#[tokio::test]
async fn remote_detail_is_reported_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ask"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "detail": "No content found" })),
        )
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .ask(
            &AskRequest {
                question: "q".to_string(),
            },
            Some("u1"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ClientError::Remote {
            status: 400,
            detail: Some("No content found".to_string())
        }
    );
    assert_eq!(err.user_message("Failed to get answer"), "No content found");
}

#[tokio::test]
async fn structured_detail_is_kept_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/scrape"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{ "loc": ["body", "urls"], "msg": "field required" }]
        })))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let request = ScrapeRequest {
        urls: vec!["x".to_string()],
        use_enhanced_rendering: false,
    };
    let err = service
        .scrape(&request, None, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ClientError::Remote {
            status: 422,
            detail: Some(detail),
        } => assert!(detail.contains("field required")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn error_without_detail_uses_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/urls"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let err = service
        .list_urls(Some("u1"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ClientError::Remote {
            status: 500,
            detail: None
        }
    );
    assert_eq!(err.user_message("Failed to load URLs"), "Failed to load URLs");
}

#[tokio::test]
async fn empty_scrape_is_rejected_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let request = ScrapeRequest {
        urls: Vec::new(),
        use_enhanced_rendering: false,
    };
    let err = service
        .scrape(&request, None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn cancellation_abandons_slow_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/urls"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "urls": [] }))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let service = service_for(&server);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = service.list_urls(None, &cancel).await.unwrap_err();
    assert_eq!(err, ClientError::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let service = ReqwestService::new(&ServiceSettings {
        api_base_url: "http://127.0.0.1:9".to_string(),
        connect_timeout: Duration::from_secs(2),
        ..ServiceSettings::default()
    })
    .expect("service");

    let err = service
        .list_urls(None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Network(_)));
    assert_eq!(
        err.user_message("Failed to load URLs"),
        "Failed to load URLs: the server could not be reached"
    );
}

#[tokio::test]
async fn list_and_remove_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/urls"))
        .and(header(SESSION_HEADER, "u1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "urls": ["https://a.example/", "https://b.example/"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/remove-url"))
        .and(header(SESSION_HEADER, "u1"))
        .and(body_json(json!({ "url": "https://a.example/" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "Removed https://a.example/" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = service_for(&server);
    let cancel = CancellationToken::new();

    let listed = service.list_urls(Some("u1"), &cancel).await.expect("list");
    assert_eq!(listed.urls.len(), 2);

    let removed = service
        .remove_url(
            &RemoveUrlRequest {
                url: "https://a.example/".to_string(),
            },
            Some("u1"),
            &cancel,
        )
        .await
        .expect("remove");
    assert_eq!(removed.message, "Removed https://a.example/");
}

#[tokio::test]
async fn base_path_is_preserved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/urls"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "urls": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let service = ReqwestService::new(&ServiceSettings {
        api_base_url: format!("{}/api", server.uri()),
        ..ServiceSettings::default()
    })
    .expect("service");

    let listed = service
        .list_urls(None, &CancellationToken::new())
        .await
        .expect("list");
    assert!(listed.urls.is_empty());
}
