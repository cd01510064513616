//! Publish orchestration against a mock Open Cloud endpoint

use crate::integration::test_utils::TestWorkspace;
use placegraft::error::PublishError;
use placegraft::manifest::{PlaceId, PreparedManifest, PreparedTarget};
use placegraft::publish::{publish_prepared, publish_target, OpenCloudClient, PublishState, RetryPolicy};
use serde_json::json;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNIVERSE_ID: u64 = 99;
const API_KEY: &str = "test-api-key";
const VERSIONS_PATH: &str = "/universes/v1/99/places/42/versions";

fn client(base: &str) -> OpenCloudClient {
    OpenCloudClient::new(base, UNIVERSE_ID, API_KEY, Duration::from_secs(5)).unwrap()
}

fn instant(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts)
        .unwrap()
        .with_backoff(Duration::ZERO, Duration::ZERO)
}

fn place_id() -> PlaceId {
    PlaceId::new(42).unwrap()
}

fn versions_mock() -> wiremock::MockBuilder {
    Mock::given(method("POST"))
        .and(path(VERSIONS_PATH))
        .and(query_param("versionType", "Published"))
        .and(header("x-api-key", API_KEY))
        .and(header("content-type", "application/xml"))
}

#[tokio::test]
async fn test_success_parses_version_number() {
    let server = MockServer::start().await;
    versions_mock()
        .and(body_bytes(b"<roblox/>".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "versionNumber": 31 })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = publish_target(&client(&server.uri()), &instant(6), "lobby", place_id(), b"<roblox/>")
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.version_number, Some(31));
    assert_eq!(outcome.summary(), "Published lobby (placeId=42) version 31");
}

#[tokio::test]
async fn test_success_without_version_is_still_success() {
    let server = MockServer::start().await;
    versions_mock()
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = publish_target(&client(&server.uri()), &instant(6), "lobby", place_id(), b"x")
        .await
        .unwrap();

    assert_eq!(outcome.version_number, None);
    assert!(outcome.summary().ends_with("Response: accepted"));
}

#[tokio::test]
async fn test_persistent_conflict_makes_exactly_max_attempts() {
    let server = MockServer::start().await;
    versions_mock()
        .respond_with(ResponseTemplate::new(409).set_body_string("version conflict"))
        .expect(3)
        .mount(&server)
        .await;

    let result = publish_target(&client(&server.uri()), &instant(3), "lobby", place_id(), b"x").await;

    match result {
        Err(PublishError::ConflictExhausted {
            attempt,
            max_attempts,
            body,
            ..
        }) => {
            assert_eq!((attempt, max_attempts), (3, 3));
            assert_eq!(body, "version conflict");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_conflict_then_success_stops_at_k() {
    let server = MockServer::start().await;
    versions_mock()
        .respond_with(ResponseTemplate::new(409))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    versions_mock()
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "versionNumber": 8 })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = publish_target(&client(&server.uri()), &instant(6), "lobby", place_id(), b"x")
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.version_number, Some(8));
    assert_eq!(
        outcome.history.last(),
        Some(&PublishState::Succeeded {
            attempts: 3,
            version: Some(8)
        })
    );
}

#[tokio::test]
async fn test_server_error_is_fatal_immediately() {
    let server = MockServer::start().await;
    versions_mock()
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    let result = publish_target(&client(&server.uri()), &instant(6), "lobby", place_id(), b"x").await;

    assert!(matches!(
        result,
        Err(PublishError::HttpFailure { status: 500, attempt: 1, max_attempts: 6, ref body, .. }) if body == "internal"
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_network_error() {
    // Bind and release a port so nothing is listening on it.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let base = format!("http://127.0.0.1:{}", port);

    let result = publish_target(&client(&base), &instant(2), "lobby", place_id(), b"x").await;

    assert!(matches!(
        result,
        Err(PublishError::NetworkExhausted { attempt: 2, max_attempts: 2, .. })
    ));
}

/// Serve `response` verbatim to every connection once its request body has
/// arrived, then close. Returns the base URL and a count of requests served.
fn raw_server(request_body: &'static [u8], response: &'static [u8]) -> (String, Arc<AtomicUsize>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let served = Arc::new(AtomicUsize::new(0));
    let counter = served.clone();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut received = Vec::new();
            let mut chunk = [0u8; 4096];
            while !received.ends_with(request_body) {
                match stream.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => received.extend_from_slice(&chunk[..n]),
                }
            }
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = stream.write_all(response);
        }
    });
    (base, served)
}

#[tokio::test]
async fn test_truncated_success_body_is_not_reuploaded() {
    let (base, served) = raw_server(
        b"<roblox/>",
        b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\n{\"versionNumber\":",
    );

    let outcome = publish_target(&client(&base), &instant(3), "lobby", place_id(), b"<roblox/>")
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.version_number, None);
    assert_eq!(served.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_truncated_conflict_body_is_still_a_conflict() {
    let (base, served) = raw_server(
        b"<roblox/>",
        b"HTTP/1.1 409 Conflict\r\nContent-Length: 100\r\nConnection: close\r\n\r\npartial",
    );

    let result = publish_target(&client(&base), &instant(2), "lobby", place_id(), b"<roblox/>").await;

    assert!(
        matches!(result, Err(PublishError::ConflictExhausted { attempt: 2, max_attempts: 2, .. })),
        "unexpected result: {:?}",
        result
    );
    assert_eq!(served.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_prepared_manifest_publishes_in_order() {
    let ws = TestWorkspace::new();
    ws.write("build/places/lobby.rbxlx", "<roblox>lobby</roblox>");
    ws.write("build/places/match.rbxlx", "<roblox>match</roblox>");
    let manifest = PreparedManifest {
        targets: vec![
            PreparedTarget {
                name: "lobby".into(),
                place_id: place_id(),
                artifact_path: PathBuf::from("build/places/lobby.rbxlx"),
            },
            PreparedTarget {
                name: "match".into(),
                place_id: PlaceId::new(43).unwrap(),
                artifact_path: PathBuf::from("build/places/match.rbxlx"),
            },
        ],
    };

    let server = MockServer::start().await;
    versions_mock()
        .and(body_bytes(b"<roblox>lobby</roblox>".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "versionNumber": 1 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/universes/v1/99/places/43/versions"))
        .and(body_bytes(b"<roblox>match</roblox>".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "versionNumber": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    let outcomes = publish_prepared(&client(&server.uri()), &instant(1), &manifest, ws.root())
        .await
        .unwrap();

    let versions: Vec<(String, Option<u64>)> = outcomes
        .into_iter()
        .map(|o| (o.name, o.version_number))
        .collect();
    assert_eq!(
        versions,
        vec![("lobby".to_string(), Some(1)), ("match".to_string(), Some(2))]
    );
}
