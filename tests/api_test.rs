//! HTTP-level tests for the router, with wiremock standing in for the node.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use proofforge_verifier::api::{router, AppState};
use proofforge_verifier::config::Config;
use proofforge_verifier::error::CHAIN_FETCH_FAILED;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

fn app(node_url: &str) -> Router {
    let config = Config {
        node_url: node_url.to_string(),
        ..Config::default()
    };
    router(AppState::from_config(config).unwrap())
}

async fn mount_rpc(server: &MockServer, rpc_method: &str, result: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": result,
        })))
        .mount(server)
        .await;
}

async fn healthy_node() -> MockServer {
    let server = MockServer::start().await;
    mount_rpc(
        &server,
        "system_health",
        json!({ "peers": 2, "isSyncing": false, "shouldHavePeers": true }),
    )
    .await;
    mount_rpc(&server, "chain_getHeader", json!({ "number": "0x3e8" })).await;
    server
}

fn record(id: u32, metadata: &str, expires_at: i64, revoked: bool) -> Value {
    json!({
        "id": id,
        "owner": ALICE,
        "issuer": "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty",
        "metadata": format!("0x{}", hex::encode(metadata)),
        "revoked": revoked,
        "expires_at": expires_at,
    })
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn account_certificates_returns_resolved_and_failed_records() {
    let server = healthy_node().await;
    mount_rpc(
        &server,
        "certificates_getAccountCertificates",
        json!([
            record(1, r#"{"name":"WHMIS","cert_type":"Safety","issued_at":1700000000}"#, 0, false),
            record(2, r#"{"name":"Rigging"}"#, 2000, false),
            record(3, r#"{"name":"Crane","cert_type":"Operator","issued_at":1700000000}"#, 900, false),
        ]),
    )
    .await;

    let response = get(
        app(&server.uri()),
        &format!("/api/accounts/{}/certificates", ALICE),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["account"], ALICE);
    assert_eq!(body["blockHeight"], 1000);

    let certificates = body["certificates"].as_array().unwrap();
    assert_eq!(certificates.len(), 2);
    assert_eq!(certificates[0]["position"], 0);
    assert_eq!(certificates[0]["name"], "WHMIS");
    assert_eq!(certificates[0]["status"], "Active");
    assert_eq!(certificates[0]["expiresAt"], Value::Null);
    assert_eq!(certificates[1]["position"], 2);
    assert_eq!(certificates[1]["status"], "Expired");

    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["position"], 1);
    assert_eq!(errors[0]["id"], "2");
}

#[tokio::test]
async fn account_certificates_maps_node_failure_to_bad_gateway() {
    let response = get(
        app("http://127.0.0.1:1"),
        &format!("/api/accounts/{}/certificates", ALICE),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["message"], CHAIN_FETCH_FAILED);
}

#[tokio::test]
async fn certificate_validity_reports_runtime_answer() {
    let server = healthy_node().await;
    mount_rpc(&server, "certificates_isCertificateValid", json!(false)).await;

    let response = get(app(&server.uri()), "/api/certificates/42/valid").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, json!({ "id": "42", "valid": false }));
}

#[tokio::test]
async fn submitting_blank_account_re_renders_form_with_error() {
    let response = app("http://127.0.0.1:1")
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/verify")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("account=+++"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response)
        .await
        .contains("Please enter an account address"));
}

#[tokio::test]
async fn submitting_account_redirects_to_its_page() {
    let response = app("http://127.0.0.1:1")
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/verify")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("account=++{}++", ALICE)))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        format!("/verify/{}", ALICE).as_str()
    );
}

#[tokio::test]
async fn account_page_shows_empty_state() {
    let server = healthy_node().await;
    mount_rpc(&server, "certificates_getAccountCertificates", json!([])).await;

    let response = get(app(&server.uri()), &format!("/verify/{}", ALICE)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("No Certificates Found"));
}

#[tokio::test]
async fn account_page_shows_error_state_when_node_is_down() {
    let response = get(app("http://127.0.0.1:1"), &format!("/verify/{}", ALICE)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_string(response).await;
    assert!(body.contains("Error Loading Certificates"));
    assert!(!body.contains("No Certificates Found"));
}

#[tokio::test]
async fn account_qr_is_svg() {
    let response = get(app("http://127.0.0.1:1"), &format!("/verify/{}/qr", ALICE)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
    assert!(body_string(response).await.contains("<svg"));
}

#[tokio::test]
async fn health_reports_node_state() {
    let server = healthy_node().await;
    let response = get(app(&server.uri()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["chain_node"]["peers"], 2);

    let response = get(app("http://127.0.0.1:1"), "/health").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn cold_health_check_calls_node_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "system_health" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": { "peers": 1, "isSyncing": false },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = get(app(&server.uri()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn account_page_pairs_each_label_with_its_value() {
    let server = healthy_node().await;
    mount_rpc(
        &server,
        "certificates_getAccountCertificates",
        json!([record(
            1,
            r#"{"name":"WHMIS","cert_type":"Safety","issued_at":1700000000}"#,
            0,
            false
        )]),
    )
    .await;

    let response = get(app(&server.uri()), &format!("/verify/{}", ALICE)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let compact: String = body_string(response).await.split_whitespace().collect();
    assert!(compact.contains("<dt>Issued</dt><dd>"));
    assert!(compact.contains("<dt>Expires</dt><dd>Never</dd>"));
}
