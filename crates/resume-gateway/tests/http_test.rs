//! MCP over HTTP, driven through the router without binding a socket

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use resume_gateway::{Gateway, GatewayConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const KEY: &str = "http-key";

fn router(dir: &tempfile::TempDir, key: Option<&str>) -> Router {
    let mut config = GatewayConfig::default().with_database_path(dir.path().join("resume.db"));
    if let Some(key) = key {
        config = config.with_api_key(key);
    }
    Gateway::from_config(config).unwrap().build_router()
}

async fn rpc(router: &Router, id: u64, method: &str, params: Value) -> Value {
    let body = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
    let response = router
        .clone()
        .oneshot(
            Request::post("/mcp")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn tool(router: &Router, id: u64, name: &str, arguments: Value) -> (bool, Value) {
    let response = rpc(router, id, "tools/call", json!({"name": name, "arguments": arguments})).await;
    let result = &response["result"];
    let text = result["content"][0]["text"].as_str().unwrap();
    (result["isError"] == json!(true), serde_json::from_str(text).unwrap())
}

#[tokio::test]
async fn full_session_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(&dir, Some(KEY));

    let init = rpc(&router, 1, "initialize", json!({})).await;
    assert_eq!(init["result"]["serverInfo"]["name"], "resume-mcp");

    let tools = rpc(&router, 2, "tools/list", json!({})).await;
    assert_eq!(tools["result"]["tools"].as_array().unwrap().len(), 5);

    let (failed, payload) = tool(
        &router,
        3,
        "update_resume",
        json!({"resume": {"name": "Ada", "skills": ["math"]}, "apiKey": KEY}),
    )
    .await;
    assert!(!failed);
    assert_eq!(payload["resume"]["skills"], json!(["math"]));

    let (_, current) = tool(&router, 4, "get_resume", json!({})).await;
    assert_eq!(current, json!({"name": "Ada", "skills": ["math"]}));

    let (_, listing) = tool(&router, 5, "list_versions", json!({})).await;
    let versions = listing["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 1);
    assert!(versions[0].as_str().unwrap().starts_with("backup-"));
}

#[tokio::test]
async fn mutations_rejected_without_configured_key() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(&dir, None);

    let (failed, payload) = tool(
        &router,
        1,
        "patch_resume",
        json!({"partialResume": {"name": "Mallory"}, "apiKey": "guess"}),
    )
    .await;
    assert!(failed);
    assert_eq!(payload["kind"], "unauthorized");
    assert_eq!(payload["context"], "patch_resume");

    let (_, current) = tool(&router, 2, "get_resume", json!({})).await;
    assert_eq!(current, json!({}));
}

#[tokio::test]
async fn unknown_method_and_tool() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(&dir, Some(KEY));

    let missing = rpc(&router, 1, "resources/list", json!({})).await;
    assert_eq!(missing["error"]["code"], -32601);

    let unknown = rpc(&router, 2, "tools/call", json!({"name": "drop_table"})).await;
    assert_eq!(unknown["error"]["code"], -32602);
}

#[tokio::test]
async fn health_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let router = router(&dir, Some(KEY));

    let response = router
        .clone()
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let status: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status["authMode"], "shared_secret");

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
