//! Tests for the registration site prober and the Telegram client using mock servers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::GET;
use httpmock::Method::POST;
use httpmock::MockServer;
use seat_watch::bot::processor::CommandProcessor;
use seat_watch::notify::Notifier;
use seat_watch::notify::error::NotifyError;
use seat_watch::notify::telegram::TelegramClient;
use seat_watch::probe::Prober;
use seat_watch::probe::banner_prober::BannerProber;
use seat_watch::probe::error::ProbeError;
use seat_watch::service::subscription_service::SubscriptionService;
use seat_watch::task::update_poller::UpdatePoller;

mod common;

/// Loads a test response file from the responses directory.
fn get_response(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/responses");
    path.push(filename);
    std::fs::read_to_string(path).expect("Failed to read response file")
}

fn mock_session(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/term/search")
            .query_param("mode", "search")
            .body_contains("term=202510");
        then.status(200)
            .header("set-cookie", "JSESSIONID=abc123; Path=/; HttpOnly")
            .header("content-type", "application/json")
            .body(r#"{"fwdURL":"/StudentRegistration/ssb/classSearch/classSearch"}"#);
    })
}

#[tokio::test]
async fn test_banner_probe() {
    let server = MockServer::start();
    let prober = BannerProber::new(server.url(""), "202510", 60).unwrap();

    let session = mock_session(&server);
    let search = server.mock(|when, then| {
        when.method(GET)
            .path("/searchResults/searchResults")
            .query_param("txt_term", "202510")
            .query_param("txt_keywordlike", "12345")
            .header("cookie", "JSESSIONID=abc123");
        then.status(200)
            .header("content-type", "application/json")
            .body(get_response("banner_search_results.json"));
    });

    let availability = prober.probe("12345").await.expect("Failed to probe");

    session.assert();
    search.assert();
    assert_eq!(availability.seats, 2);
    assert_eq!(availability.title, "Data Structures & Algorithms");
}

#[tokio::test]
async fn test_banner_probe_not_found() {
    let server = MockServer::start();
    let prober = BannerProber::new(server.url(""), "202510", 60).unwrap();

    mock_session(&server);
    server.mock(|when, then| {
        when.method(GET).path("/searchResults/searchResults");
        then.status(200)
            .header("content-type", "application/json")
            .body(get_response("banner_search_empty.json"));
    });

    let err = prober.probe("99999").await.unwrap_err();
    assert!(matches!(err, ProbeError::NotFound { code } if code == "99999"));
}

#[tokio::test]
async fn test_banner_probe_bad_status() {
    let server = MockServer::start();
    let prober = BannerProber::new(server.url(""), "202510", 60).unwrap();

    server.mock(|when, then| {
        when.method(POST).path("/term/search");
        then.status(503);
    });

    let err = prober.probe("12345").await.unwrap_err();
    assert!(matches!(err, ProbeError::BadStatus { status: 503 }));
}

#[tokio::test]
async fn test_banner_probe_rejects_invalid_code() {
    let server = MockServer::start();
    let prober = BannerProber::new(server.url(""), "202510", 60).unwrap();
    let session = mock_session(&server);

    let err = prober.probe("12345&txt_term=1").await.unwrap_err();

    assert!(matches!(err, ProbeError::InvalidCode { .. }));
    session.assert_hits(0);
}

#[tokio::test]
async fn test_telegram_send_message() {
    let server = MockServer::start();
    let client = TelegramClient::new(server.url(""), "TOKEN").unwrap();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/botTOKEN/sendMessage")
            .body_contains(r#""chat_id":"100""#)
            .body_contains("Good news!");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"ok":true,"result":{"message_id":5,"chat":{"id":100},"date":1760000000}}"#);
    });

    client
        .deliver("100", "Good news! Class 1 (A) now has 1 seat(s) available.")
        .await
        .expect("Failed to deliver");
    mock.assert();
}

#[tokio::test]
async fn test_telegram_api_error() {
    let server = MockServer::start();
    let client = TelegramClient::new(server.url(""), "TOKEN").unwrap();

    server.mock(|when, then| {
        when.method(POST).path("/botTOKEN/sendMessage");
        then.status(403)
            .header("content-type", "application/json")
            .body(r#"{"ok":false,"error_code":403,"description":"Forbidden: bot was blocked by the user"}"#);
    });

    let err = client.send_message("100", "hi").await.unwrap_err();
    assert!(
        matches!(err, NotifyError::ApiError { message } if message.contains("blocked"))
    );
}

#[tokio::test]
async fn test_telegram_empty_recipient() {
    let server = MockServer::start();
    let client = TelegramClient::new(server.url(""), "TOKEN").unwrap();

    let err = client.send_message("", "hi").await.unwrap_err();
    assert!(matches!(err, NotifyError::InvalidRecipient { .. }));
}

#[tokio::test]
async fn test_telegram_get_updates_long_polls() {
    let server = MockServer::start();
    let client = TelegramClient::new(server.url(""), "TOKEN").unwrap();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/botTOKEN/getUpdates")
            .body_contains(r#""offset":7"#)
            .body_contains(r#""timeout":25"#);
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"ok":true,"result":[]}"#);
    });

    let updates = client
        .get_updates(7, 100, Duration::from_secs(25))
        .await
        .expect("Failed to get updates");
    mock.assert();
    assert!(updates.is_empty());
}

#[tokio::test]
async fn test_update_poller_advances_offset() {
    let server = MockServer::start();
    let (db, db_path) = common::setup_db().await;
    let client = Arc::new(TelegramClient::new(server.url(""), "TOKEN").unwrap());
    let notifier = common::RecordingNotifier::new();
    let service = Arc::new(SubscriptionService::new(
        db.clone(),
        Arc::new(common::FakeProber::new()),
        Duration::from_secs(5),
    ));
    let processor = CommandProcessor::new(service, Arc::new(notifier.clone()));
    let poller = UpdatePoller::new(client, processor, Duration::from_secs(1));

    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/botTOKEN/getUpdates")
            .body_contains(r#""offset":0"#)
            .body_contains(r#""timeout":30"#);
        then.status(200)
            .header("content-type", "application/json")
            .body(get_response("telegram_get_updates.json"));
    });
    let count = poller.poll_once().await.expect("Failed to poll");

    first.assert();
    assert_eq!(count, 3);
    assert_eq!(poller.offset(), 13);
    assert!(notifier.delivered_to("100")[0].starts_with("Hello!"));
    assert_eq!(notifier.delivered_to("200"), vec!["You said: hi"]);

    let next = server.mock(|when, then| {
        when.method(POST)
            .path("/botTOKEN/getUpdates")
            .body_contains(r#""offset":13"#);
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"ok":true,"result":[]}"#);
    });
    assert_eq!(poller.poll_once().await.unwrap(), 0);
    next.assert();
    assert_eq!(poller.offset(), 13);

    common::teardown_db(db_path).await;
}
