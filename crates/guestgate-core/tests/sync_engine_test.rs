#![allow(clippy::unwrap_used)]
// Integration tests for `SyncEngine` against a mocked portal.

use std::sync::Arc;

use chrono::Utc;
use guestgate_api::PortalClient;
use guestgate_core::model::{SyncKind, SyncOutcome, Token};
use guestgate_core::{CoreError, NewSale, SyncEngine, TokenLedger, TokenStatus, MAX_BATCH_SIZE};
use serde_json::json;
use url::Url;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, SyncEngine, Arc<TokenLedger>) {
    // A dedicated (non-pooled) server: dropping it must actually close
    // the listener so the "unreachable device" test gets a refused
    // connection rather than a recycled pool server answering 404.
    let server = MockServer::builder().start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let portal = Arc::new(PortalClient::with_client(reqwest::Client::new(), base_url));
    let ledger = Arc::new(TokenLedger::new());
    let engine = SyncEngine::new(Arc::clone(&ledger), portal);
    (server, engine, ledger)
}

fn tenant() -> Uuid {
    Uuid::from_u128(0xA11C_E000)
}

fn token(username: &str) -> Token {
    Token::new(
        tenant(),
        username.to_owned(),
        "s3cret".to_owned(),
        "guest-wifi".to_owned(),
    )
}

fn batch_response(tokens: Vec<serde_json::Value>) -> serde_json::Value {
    let found = tokens.len();
    json!({
        "success": true,
        "tokens": tokens,
        "total_found": found
    })
}

fn active_report(identifier: &str) -> serde_json::Value {
    json!({
        "identifier": identifier,
        "success": true,
        "status": "active",
        "bandwidth_up": 4096,
        "bandwidth_down": 81920,
        "usage_count": 2,
        "first_seen": 1_717_000_000,
        "devices": [
            { "mac": "aa:bb:cc:dd:ee:ff", "online": true, "ip": "10.0.0.7" }
        ]
    })
}

async fn mock_batch(server: &MockServer, response: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/tokens/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .mount(server)
        .await;
}

// ── Classification ──────────────────────────────────────────────────

#[tokio::test]
async fn active_report_advances_and_applies_usage() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("482913")).unwrap();
    ledger.mark_sold("482913", Utc::now()).unwrap();

    mock_batch(&server, batch_response(vec![active_report("482913")])).await;

    let report = engine.sync_batch(tenant(), &["482913".into()]).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.updated, 1);

    let t = ledger.get("482913").unwrap();
    assert_eq!(t.status, TokenStatus::Active);
    assert_eq!(t.first_used_at.unwrap().timestamp(), 1_717_000_000);
    assert_eq!(t.bytes_down, 81920);
    assert_eq!(t.connected_mac.as_ref().unwrap().as_str(), "aa:bb:cc:dd:ee:ff");

    let connections = ledger.connections_for("482913");
    assert_eq!(connections.len(), 1);
    assert!(connections[0].is_open());
}

#[tokio::test]
async fn missing_used_token_expires() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("111111")).unwrap();
    ledger.mark_sold("111111", Utc::now()).unwrap();
    ledger.mark_active("111111", Utc::now()).unwrap();

    // Device no longer knows the token at all.
    mock_batch(&server, batch_response(vec![])).await;

    engine.sync_batch(tenant(), &["111111".into()]).await.unwrap();
    assert_eq!(ledger.get("111111").unwrap().status, TokenStatus::Expired);
}

#[tokio::test]
async fn missing_unused_token_is_disabled_not_expired() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("222222")).unwrap();
    ledger.mark_sold("222222", Utc::now()).unwrap();

    mock_batch(&server, batch_response(vec![])).await;

    engine.sync_batch(tenant(), &["222222".into()]).await.unwrap();
    let t = ledger.get("222222").unwrap();
    assert_eq!(t.status, TokenStatus::Disabled);
    assert!(t.first_used_at.is_none());
}

#[tokio::test]
async fn not_found_entry_inside_success_envelope_counts_as_missing() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("333333")).unwrap();
    ledger.mark_sold("333333", Utc::now()).unwrap();

    let response = batch_response(vec![json!({
        "identifier": "333333",
        "success": false,
        "error": "Token not found"
    })]);
    mock_batch(&server, response).await;

    engine.sync_batch(tenant(), &["333333".into()]).await.unwrap();
    assert_eq!(ledger.get("333333").unwrap().status, TokenStatus::Disabled);
}

#[tokio::test]
async fn unused_report_changes_nothing() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("444444")).unwrap();

    let response = batch_response(vec![json!({
        "identifier": "444444",
        "success": true,
        "status": "unused"
    })]);
    mock_batch(&server, response).await;

    let report = engine.sync_batch(tenant(), &["444444".into()]).await.unwrap();
    assert_eq!(report.updated, 0);

    let t = ledger.get("444444").unwrap();
    assert_eq!(t.status, TokenStatus::Available);
    assert!(t.last_synced_at.is_some());
}

// ── Idempotence ─────────────────────────────────────────────────────

#[tokio::test]
async fn resync_of_unchanged_device_state_is_a_noop() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("482913")).unwrap();
    ledger.mark_sold("482913", Utc::now()).unwrap();

    mock_batch(&server, batch_response(vec![active_report("482913")])).await;

    let first = engine.sync_batch(tenant(), &["482913".into()]).await.unwrap();
    assert_eq!(first.updated, 1);
    let after_first = ledger.get("482913").unwrap();

    let second = engine.sync_batch(tenant(), &["482913".into()]).await.unwrap();
    assert_eq!(second.updated, 0);

    let after_second = ledger.get("482913").unwrap();
    assert_eq!(after_second.status, TokenStatus::Active);
    assert_eq!(after_second.first_used_at, after_first.first_used_at);
    assert_eq!(after_second.bytes_down, after_first.bytes_down);
    assert_eq!(ledger.connections_for("482913").len(), 1);
}

// ── Batch mechanics ─────────────────────────────────────────────────

#[tokio::test]
async fn oversized_batch_rejected_without_device_call() {
    let (server, engine, _ledger) = setup().await;

    // Any request reaching the server would fail the expect(0) below.
    Mock::given(method("POST"))
        .and(path("/api/tokens/check"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let identifiers: Vec<String> = (0..=MAX_BATCH_SIZE).map(|i| format!("{i:06}")).collect();
    let err = engine.sync_batch(tenant(), &identifiers).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn terminal_tokens_never_reach_the_device() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("555555")).unwrap();
    ledger.mark_disabled("555555").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/tokens/check"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = engine.sync_batch(tenant(), &["555555".into()]).await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(ledger.get("555555").unwrap().status, TokenStatus::Disabled);
}

#[tokio::test]
async fn full_batch_of_twenty_is_accepted() {
    let (server, engine, ledger) = setup().await;

    let identifiers: Vec<String> = (0..MAX_BATCH_SIZE).map(|i| format!("{i:06}")).collect();
    for id in &identifiers {
        ledger.register(token(id)).unwrap();
        ledger.mark_sold(id, Utc::now()).unwrap();
    }

    let reports = identifiers.iter().map(|id| active_report(id)).collect();
    mock_batch(&server, batch_response(reports)).await;

    let report = engine.sync_batch(tenant(), &identifiers).await.unwrap();
    assert_eq!(report.checked, 20);
    assert_eq!(report.updated, 20);
}

#[tokio::test]
async fn foreign_tenant_token_looks_unknown() {
    let (server, engine, ledger) = setup().await;

    let mut foreign = token("999999");
    foreign.tenant_id = Uuid::from_u128(0xB0B);
    ledger.register(foreign).unwrap();
    ledger.mark_sold("999999", Utc::now()).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/tokens/check"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let report = engine.sync_batch(tenant(), &["999999".into()]).await.unwrap();
    assert_eq!(report.checked, 0);
    assert!(report.tokens[0].is_none());
    // The other tenant's token itself stays put.
    assert_eq!(ledger.get("999999").unwrap().status, TokenStatus::Sold);
}

#[tokio::test]
async fn empty_reconcilable_batch_still_writes_an_audit_row() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("555555")).unwrap();
    ledger.mark_disabled("555555").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/tokens/check"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    engine.sync_batch(tenant(), &["555555".into()]).await.unwrap();

    let logs = ledger.sync_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, SyncKind::BatchSync);
    assert_eq!(logs[0].checked, 0);
    assert_eq!(logs[0].outcome, SyncOutcome::Success);
}

#[tokio::test]
async fn per_token_failure_spares_the_rest_of_the_batch() {
    let (server, engine, ledger) = setup().await;

    // An ACTIVE record without a first-use timestamp is inconsistent;
    // reconciling it as missing cannot legally land anywhere.
    let mut broken = token("666666");
    broken.status = TokenStatus::Active;
    ledger.register(broken).unwrap();

    ledger.register(token("777777")).unwrap();
    ledger.mark_sold("777777", Utc::now()).unwrap();

    mock_batch(&server, batch_response(vec![])).await;

    let report = engine
        .sync_batch(tenant(), &["666666".into(), "777777".into()])
        .await
        .unwrap();

    // The healthy token still reconciled; the broken one yields no
    // per-token view.
    assert_eq!(ledger.get("777777").unwrap().status, TokenStatus::Disabled);
    assert_eq!(report.updated, 1);
    assert!(report.tokens[0].is_none());
    assert_eq!(
        report.tokens[1].as_ref().unwrap().status,
        TokenStatus::Disabled
    );

    let logs = engine.ledger().sync_logs();
    assert_eq!(logs.last().unwrap().outcome, SyncOutcome::Partial);
}

#[tokio::test]
async fn unreachable_device_leaves_state_untouched() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("888888")).unwrap();
    ledger.mark_sold("888888", Utc::now()).unwrap();

    // Kill the server so the connection is refused.
    let addr = *server.address();
    drop(server);
    // Shutdown is asynchronous: wait until the listener is actually
    // closed, so the engine sees a refused connection instead of a
    // reset from the still-dying server.
    while tokio::net::TcpStream::connect(addr).await.is_ok() {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let err = engine.sync_batch(tenant(), &["888888".into()]).await.unwrap_err();
    assert!(matches!(err, CoreError::DeviceUnreachable { .. }));

    let t = ledger.get("888888").unwrap();
    assert_eq!(t.status, TokenStatus::Sold);
    assert!(t.last_synced_at.is_none());

    let logs = ledger.sync_logs();
    assert_eq!(logs.last().unwrap().outcome, SyncOutcome::DeviceUnreachable);
}

// ── Sale / admin flows ──────────────────────────────────────────────

fn sale(username: &str) -> NewSale {
    NewSale {
        tenant_id: Uuid::new_v4(),
        username: username.to_owned(),
        secret: "s3cret".to_owned(),
        wlan: "guest-wifi".to_owned(),
        valid_time_seconds: 86_400,
    }
}

#[tokio::test]
async fn complete_sale_provisions_then_records() {
    let (server, engine, ledger) = setup().await;

    let response = json!({
        "success": true,
        "token": {
            "identifier": "482913",
            "status": "unused",
            "created_at": 1_717_000_000,
            "expires_at": 1_717_086_400
        }
    });
    Mock::given(method("POST"))
        .and(path("/api/tokens/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .expect(1)
        .mount(&server)
        .await;

    let t = engine.complete_sale(sale("482913")).await.unwrap();
    assert_eq!(t.status, TokenStatus::Sold);
    assert!(t.sold_at.is_some());
    assert_eq!(t.created_at.unwrap().timestamp(), 1_717_000_000);
    assert_eq!(t.expires_at.unwrap().timestamp(), 1_717_086_400);
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn failed_device_create_leaves_no_ledger_entry() {
    let (server, engine, ledger) = setup().await;

    let response = json!({ "success": false, "error": "token table full" });
    Mock::given(method("POST"))
        .and(path("/api/tokens/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .mount(&server)
        .await;

    let err = engine.complete_sale(sale("482913")).await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }));
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn sale_of_preprovisioned_token_marks_it_sold() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("482913")).unwrap();

    let response = json!({ "success": true });
    Mock::given(method("POST"))
        .and(path("/api/tokens/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .mount(&server)
        .await;

    let t = engine.complete_sale(sale("482913")).await.unwrap();
    assert_eq!(t.status, TokenStatus::Sold);
    assert_eq!(ledger.len(), 1);
}

#[tokio::test]
async fn invalidate_survives_portal_failure() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("482913")).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/tokens/disable"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let t = engine.invalidate("482913").await.unwrap();
    assert_eq!(t.status, TokenStatus::Invalidated);
    assert_eq!(
        ledger.get("482913").unwrap().status,
        TokenStatus::Invalidated
    );
}

#[tokio::test]
async fn extend_moves_expiry_after_device_accepts() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("482913")).unwrap();
    ledger.mark_sold("482913", Utc::now()).unwrap();

    let response = json!({ "success": true });
    Mock::given(method("POST"))
        .and(path("/api/tokens/extend"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&response))
        .expect(1)
        .mount(&server)
        .await;

    let t = engine.extend("482913", 3_600).await.unwrap();
    assert_eq!(t.valid_time_seconds, 3_600);
}

#[tokio::test]
async fn extend_of_terminal_token_is_refused_locally() {
    let (server, engine, ledger) = setup().await;
    ledger.register(token("482913")).unwrap();
    ledger.mark_disabled("482913").unwrap();

    Mock::given(method("POST"))
        .and(path("/api/tokens/extend"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = engine.extend("482913", 3_600).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

// ── Health check ────────────────────────────────────────────────────

#[tokio::test]
async fn health_check_logs_outcome() {
    let (server, engine, ledger) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;

    engine.health_check().await.unwrap();

    let logs = ledger.sync_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, SyncKind::HealthCheck);
    assert_eq!(logs[0].outcome, SyncOutcome::Success);
}
