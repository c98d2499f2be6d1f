#[path = "../src/api_client.rs"]
#[allow(dead_code)] // Some fields are only read by the binary
mod api_client;

use api_client::ApiClient;
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::net::TcpListener;
use std::time::Duration;

const ROOT: &str = "0x8f3c5e1d2a4b6c7d8e9f0a1b2c3d4e5f60718293a4b5c6d7e8f9012345678901";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.base_url(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn api_client_success_paths() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();

    let health = server.mock(|when, then| {
        when.method(GET).path("/api/health");
        then.status(200).json_body(json!({
            "status": "ok",
            "version": "0.1.0",
            "defaultNetworkType": "standard",
            "networks": { "standard": ["primary", "fallback"], "turbo": ["primary"] }
        }));
    });

    let upload = server.mock(|when, then| {
        when.method(POST)
            .path("/api/storage/upload")
            .header_exists("content-type")
            .body_contains("name=\"owner_id\"")
            .body_contains("user-42")
            .body_contains("name=\"networkType\"")
            .body_contains("filename=\"notes.txt\"")
            .body_contains("hello vellum");
        then.status(200).json_body(json!({
            "success": true,
            "record": {
                "record_id": "00000000-0000-0000-0000-000000000001",
                "owner_id": "user-42",
                "root_hash": ROOT,
                "file_name": "notes.txt",
                "mime_type": "application/octet-stream",
                "size_bytes": 12,
                "network_type": "turbo",
                "profile": "fallback",
                "network": "fallback",
                "tx_hash": "0xabc",
                "explorer_url": null,
                "payment_confirmed": true,
                "created_at": "2026-01-01T00:00:00Z"
            },
            "storage_hash": ROOT,
            "network": "fallback",
            "tx_hash": "0xabc",
            "explorer_url": null,
            "payment_confirmed": true,
            "fee": {
                "sectors": 1,
                "storage_fee": "0.00000000000000001",
                "gas_fee": "0.000000000000042",
                "total_fee": "0.00000000000004201",
                "gas_estimate_degraded": false
            },
            "attempts": [
                { "profile": "primary", "role": "primary", "elapsed_ms": 12, "error": "provider unavailable" },
                { "profile": "fallback", "role": "fallback", "elapsed_ms": 30 }
            ]
        }));
    });

    let download = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/api/storage/download/{ROOT}"))
            .query_param("networkType", "turbo");
        then.status(200)
            .header("content-type", "application/octet-stream")
            .body("hello vellum");
    });

    let exists = server.mock(|when, then| {
        when.method(GET).path(format!("/api/storage/exists/{ROOT}"));
        then.status(200).json_body(json!({
            "exists": true,
            "rootHash": ROOT,
            "networkType": "standard"
        }));
    });

    let info = server.mock(|when, then| {
        when.method(GET).path(format!("/api/storage/info/{ROOT}"));
        then.status(200).json_body(json!({
            "rootHash": ROOT,
            "size": 12,
            "segments": 1,
            "finalized": true,
            "replicas": 1,
            "networkType": "standard",
            "profile": "primary"
        }));
    });

    let client = client(&server);

    let response = client.health().await.unwrap();
    assert_eq!(response.status, "ok");
    assert_eq!(response.default_network_type, "standard");
    assert_eq!(response.networks["standard"], vec!["primary", "fallback"]);

    let response = client
        .upload(
            bytes::Bytes::from_static(b"hello vellum"),
            "notes.txt",
            "user-42",
            Some("turbo"),
        )
        .await
        .unwrap();
    assert_eq!(response.storage_hash, ROOT);
    assert_eq!(response.network, "fallback");
    assert_eq!(response.record.profile, "fallback");
    assert_eq!(response.fee.as_ref().unwrap().sectors, 1);
    assert_eq!(response.attempts.len(), 2);
    assert!(response.attempts[1].error.is_none());

    let data = client.download(ROOT, Some("turbo")).await.unwrap();
    assert_eq!(&data[..], b"hello vellum");

    assert!(client.exists(ROOT, None).await.unwrap().exists);

    let response = client.info(ROOT, None).await.unwrap();
    assert_eq!(response.segments, 1);
    assert_eq!(response.replicas, Some(1));

    health.assert();
    upload.assert();
    download.assert();
    exists.assert();
    info.assert();
}

#[tokio::test]
async fn api_client_surfaces_server_error_message() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/storage/info/0x1234");
        then.status(400).json_body(json!({
            "error": "invalid_input",
            "message": "invalid_input during setup on -: invalid root hash"
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("/api/storage/download/{ROOT}"));
        then.status(404).body("gone");
    });

    let client = client(&server);

    let err = client.info("0x1234", None).await.unwrap_err().to_string();
    assert!(err.contains("400"), "{err}");
    assert!(err.contains("invalid root hash"), "{err}");

    let err = client.download(ROOT, None).await.unwrap_err().to_string();
    assert!(err.contains("404"), "{err}");
    assert!(err.contains("gone"), "{err}");
}

#[tokio::test]
async fn api_client_retries_unavailable_reads() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let unavailable = server.mock(|when, then| {
        when.method(GET).path(format!("/api/storage/exists/{ROOT}"));
        then.status(503).json_body(json!({
            "error": "provider_unavailable",
            "message": "all profiles unreachable"
        }));
    });

    let err = client(&server)
        .exists(ROOT, None)
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("all profiles unreachable"), "{err}");
    unavailable.assert_hits(3);
}

#[tokio::test]
async fn api_client_does_not_retry_uploads() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let upload = server.mock(|when, then| {
        when.method(POST).path("/api/storage/upload");
        then.status(503).json_body(json!({
            "error": "cancelled",
            "message": "server shutting down"
        }));
    });

    let result = client(&server)
        .upload(bytes::Bytes::from_static(b"x"), "x.bin", "user-1", None)
        .await;

    assert!(result.is_err());
    upload.assert_hits(1);
}
