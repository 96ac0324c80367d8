//! Integration tests for the HTTP management API.

use std::sync::Arc;

use deauth_whitelist::audit::AuditLog;
use deauth_whitelist::guard::WhitelistGuard;
use deauth_whitelist::web::WebServer;
use deauth_whitelist::whitelist::{EnforcementMode, StoreOptions, WhitelistStore};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct TestServer {
    base: String,
    client: reqwest::Client,
    cancel: CancellationToken,
    _dir: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = WhitelistStore::new(
            dir.path().join("whitelist.json"),
            StoreOptions {
                auto_backup: false,
                ..StoreOptions::default()
            },
        );
        let audit = AuditLog::open_in_memory()
            .await
            .expect("Failed to open audit log");
        let guard = WhitelistGuard::new(Arc::new(store), EnforcementMode::Strict).with_audit(audit);

        let cancel = CancellationToken::new();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        let server = WebServer::new(guard).with_cancel(cancel.clone());
        tokio::spawn(server.run_on(listener));

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            cancel,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn add(&self, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url("/api/whitelist/add"))
            .json(&body)
            .send()
            .await
            .expect("Request failed");
        let status = response.status();
        (status, response.json().await.expect("Invalid JSON"))
    }

    async fn list(&self) -> Value {
        self.client
            .get(self.url("/api/whitelist"))
            .send()
            .await
            .expect("Request failed")
            .json()
            .await
            .expect("Invalid JSON")
    }

    async fn check(&self, bssid: &str, ssid: &str) -> Value {
        self.client
            .get(self.url("/api/check"))
            .query(&[("bssid", bssid), ("ssid", ssid)])
            .send()
            .await
            .expect("Request failed")
            .json()
            .await
            .expect("Invalid JSON")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[tokio::test]
async fn test_add_list_toggle_delete() {
    let server = TestServer::start().await;

    let (status, body) = server
        .add(json!({"ssid": "Guest_*", "use_wildcard": true, "description": "guests"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let id = body["id"].as_u64().expect("id");

    let list = server.list().await;
    assert_eq!(list["networks"].as_array().expect("networks").len(), 1);
    assert_eq!(list["stats"]["wildcard_entries"], 1);
    assert_eq!(list["stats"]["ready"], true);

    assert_eq!(server.check("", "Guest_lobby").await["whitelisted"], true);

    let response = server
        .client
        .put(server.url("/api/whitelist/toggle"))
        .json(&json!({"id": id, "enabled": false}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.check("", "Guest_lobby").await["whitelisted"], false);

    let response = server
        .client
        .delete(server.url("/api/whitelist/delete"))
        .json(&json!({"id": id}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(server.list().await["networks"]
        .as_array()
        .expect("networks")
        .is_empty());
}

#[tokio::test]
async fn test_legacy_entry_field_and_delete_by_identifier() {
    let server = TestServer::start().await;

    let (status, _) = server.add(json!({"entry": "aa:bb:cc:dd:ee:ff"})).await;
    assert_eq!(status, StatusCode::OK);

    let check = server.check("AA:BB:CC:DD:EE:FF", "").await;
    assert_eq!(check["whitelisted"], true);
    assert_eq!(check["decision"]["decision"], "suppress");

    let response = server
        .client
        .delete(server.url("/api/whitelist/delete"))
        .json(&json!({"entry": "AA-BB-CC-DD-EE-FF"}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.check("AA:BB:CC:DD:EE:FF", "").await["whitelisted"], false);
}

#[tokio::test]
async fn test_error_statuses() {
    let server = TestServer::start().await;

    let (status, body) = server.add(json!({"bssid": "not-a-mac"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = server.add(json!({"ssid": "HomeNet"})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.add(json!({"ssid": "HomeNet"})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let response = server
        .client
        .put(server.url("/api/whitelist/toggle"))
        .json(&json!({"id": 999}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = server
        .client
        .delete(server.url("/api/whitelist/delete"))
        .json(&json!({}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let server = TestServer::start().await;
    server.add(json!({"ssid": "HomeNet"})).await;
    server.add(json!({"bssid": "11:22:33:44:55:66"})).await;

    let exported: Value = server
        .client
        .get(server.url("/api/whitelist/export"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    assert_eq!(exported["networks"].as_array().expect("networks").len(), 2);

    let other = TestServer::start().await;
    let response = other
        .client
        .post(other.url("/api/whitelist/import"))
        .json(&json!({"data": exported, "mode": "replace"}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(other.list().await["networks"].as_array().expect("networks").len(), 2);

    let response = other
        .client
        .post(other.url("/api/whitelist/import"))
        .json(&json!({"data": {"networks": [{"ssid": "ok"}, {"bssid": "bad"}]}}))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(other.list().await["networks"].as_array().expect("networks").len(), 2);
}

#[tokio::test]
async fn test_audit_endpoint_reports_edits() {
    let server = TestServer::start().await;
    server.add(json!({"ssid": "HomeNet"})).await;

    let audit: Value = server
        .client
        .get(server.url("/api/audit?limit=5"))
        .send()
        .await
        .expect("Request failed")
        .json()
        .await
        .expect("Invalid JSON");
    let events = audit["events"].as_array().expect("events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["event_type"], "entry_added");
    assert_eq!(audit["summary"]["total"], 1);
}
