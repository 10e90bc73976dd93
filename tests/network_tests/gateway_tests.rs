//! Tests for the HTTP gateway
//!
//! These tests verify:
//! - Route parsing and component validation
//! - Method dispatch, 404 and 405 with Allow
//! - JSON success/failure envelopes and status codes
//! - Rate limiting ahead of routing
//! - The execute endpoint

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sydb::config::Config;
use sydb::engine::Engine;
use sydb::network::{Gateway, Route};
use sydb::protocol::{Method, Request, Response};
use sydb::rate_limit::RateLimiter;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn remote() -> IpAddr {
    "10.1.2.3".parse().unwrap()
}

fn setup_gateway(max_requests: u32) -> (TempDir, Gateway) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder().base_dir(temp_dir.path()).build();
    let engine = Arc::new(Engine::open(config).unwrap());
    let limiter = RateLimiter::new(Duration::from_secs(60), max_requests);
    (temp_dir, Gateway::new(engine, limiter))
}

fn send(gateway: &Gateway, method: Method, target: &str, body: Option<Value>) -> (u16, Value) {
    let mut request = Request::new(method, target);
    if let Some(body) = body {
        request = request.with_body(body.to_string());
    }
    let response = gateway.handle(&request, remote());
    (response.status, response.body_json().unwrap())
}

fn create_shop(gateway: &Gateway) {
    let (status, _) = send(gateway, Method::Post, "/api/databases", Some(json!({ "name": "shop" })));
    assert_eq!(status, 201);
    let (status, _) = send(
        gateway,
        Method::Post,
        "/api/databases/shop/collections",
        Some(json!({
            "name": "items",
            "schema": [
                { "name": "title", "type": "string", "required": true },
                { "name": "qty", "type": "int" }
            ]
        })),
    );
    assert_eq!(status, 201);
}

// =============================================================================
// Route Parsing Tests
// =============================================================================

#[test]
fn test_route_parse() {
    assert_eq!(Route::parse("/api/databases"), Some(Route::Databases));
    assert_eq!(Route::parse("/api/databases/"), Some(Route::Databases));
    assert_eq!(Route::parse("/api/execute"), Some(Route::Execute));
    assert_eq!(
        Route::parse("/api/databases/shop/collections/items/instances/abc"),
        Some(Route::Instance {
            database: "shop".to_string(),
            collection: "items".to_string(),
            id: "abc".to_string(),
        })
    );
    assert_eq!(
        Route::parse("/api/databases/shop/collections/items/schema"),
        Some(Route::Schema {
            database: "shop".to_string(),
            collection: "items".to_string(),
        })
    );
}

#[test]
fn test_route_parse_rejects_unknown_shapes() {
    assert_eq!(Route::parse("/"), None);
    assert_eq!(Route::parse("/api/databasesX"), None);
    assert_eq!(Route::parse("/api/databases/shop/tables"), None);
    assert_eq!(
        Route::parse("/api/databases/shop/collections/items/instances/a/b"),
        None
    );
}

#[test]
fn test_route_validate_components() {
    let route = Route::parse("/api/databases/bad%20name/collections").unwrap();

    assert!(route.validate().is_err());
    assert!(Route::parse("/api/databases/shop").unwrap().validate().is_ok());
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[test]
fn test_unknown_path_is_404() {
    let (_temp, gateway) = setup_gateway(100);

    let (status, body) = send(&gateway, Method::Get, "/nope", None);

    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[test]
fn test_wrong_method_is_405_with_allow() {
    let (_temp, gateway) = setup_gateway(100);
    let request = Request::new(Method::Put, "/api/databases");

    let response: Response = gateway.handle(&request, remote());

    assert_eq!(response.status, 405);
    assert_eq!(response.header("Allow"), Some("GET, POST"));
    assert_eq!(response.body_json().unwrap()["success"], false);
}

#[test]
fn test_create_and_list_databases() {
    let (_temp, gateway) = setup_gateway(100);

    create_shop(&gateway);
    let (status, body) = send(&gateway, Method::Get, "/api/databases", None);

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["databases"], json!(["shop"]));
}

#[test]
fn test_duplicate_database_is_409() {
    let (_temp, gateway) = setup_gateway(100);
    create_shop(&gateway);

    let (status, body) = send(&gateway, Method::Post, "/api/databases", Some(json!({ "name": "shop" })));

    assert_eq!(status, 409);
    assert_eq!(body["success"], false);
}

#[test]
fn test_malformed_body_is_400() {
    let (_temp, gateway) = setup_gateway(100);
    let request = Request::new(Method::Post, "/api/databases").with_body("{not json");

    let response = gateway.handle(&request, remote());

    assert_eq!(response.status, 400);
}

#[test]
fn test_invalid_name_is_400() {
    let (_temp, gateway) = setup_gateway(100);

    let (status, _) = send(&gateway, Method::Delete, "/api/databases/..", None);
    assert_eq!(status, 400);

    let (status, _) = send(&gateway, Method::Post, "/api/databases", Some(json!({ "name": "a/b" })));
    assert_eq!(status, 400);
}

#[test]
fn test_missing_database_is_404() {
    let (_temp, gateway) = setup_gateway(100);

    let (status, body) = send(&gateway, Method::Get, "/api/databases/ghost/collections", None);

    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
}

#[test]
fn test_instance_crud() {
    let (_temp, gateway) = setup_gateway(100);
    create_shop(&gateway);
    let base = "/api/databases/shop/collections/items/instances";

    let (status, body) = send(&gateway, Method::Post, base, Some(json!({ "title": "Widget", "qty": 3 })));
    assert_eq!(status, 201);
    let id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(&gateway, Method::Get, &format!("{}?query=title:Widget", base), None);
    assert_eq!(status, 200);
    assert_eq!(body["count"], 1);
    assert_eq!(body["instances"][0]["_id"], json!(id));

    let (status, body) = send(&gateway, Method::Put, &format!("{}/{}", base, id), Some(json!({ "qty": 4 })));
    assert_eq!(status, 200);
    assert_eq!(body["instance"]["qty"], 4);

    let (status, body) = send(&gateway, Method::Get, &format!("{}/{}", base, id), None);
    assert_eq!(status, 200);
    assert_eq!(body["instance"]["title"], "Widget");

    let (status, _) = send(&gateway, Method::Delete, &format!("{}/{}", base, id), None);
    assert_eq!(status, 200);

    let (status, _) = send(&gateway, Method::Get, &format!("{}/{}", base, id), None);
    assert_eq!(status, 404);
}

#[test]
fn test_query_parameter_is_url_decoded() {
    let (_temp, gateway) = setup_gateway(100);
    create_shop(&gateway);
    let base = "/api/databases/shop/collections/items/instances";
    send(&gateway, Method::Post, base, Some(json!({ "title": "two words" })));

    let (status, body) = send(&gateway, Method::Get, &format!("{}?query=title%3Atwo+words", base), None);

    assert_eq!(status, 200);
    assert_eq!(body["count"], 1);
}

#[test]
fn test_schema_endpoint() {
    let (_temp, gateway) = setup_gateway(100);
    create_shop(&gateway);

    let (status, body) = send(&gateway, Method::Get, "/api/databases/shop/collections/items/schema", None);

    assert_eq!(status, 200);
    assert_eq!(body["schema"]["fields"][0]["name"], "title");
    assert_eq!(body["schema"]["fields"][0]["required"], true);
    assert_eq!(body["schema"]["fields"][1]["type"], "int");
}

#[test]
fn test_schema_violation_is_400() {
    let (_temp, gateway) = setup_gateway(100);
    create_shop(&gateway);

    let (status, body) = send(
        &gateway,
        Method::Post,
        "/api/databases/shop/collections/items/instances",
        Some(json!({ "qty": 3 })),
    );

    assert_eq!(status, 400);
    assert!(body["error"].as_str().unwrap().contains("title"));
}

// =============================================================================
// Rate Limit Tests
// =============================================================================

#[test]
fn test_rate_limit_rejects_before_routing() {
    let (_temp, gateway) = setup_gateway(2);

    assert_eq!(send(&gateway, Method::Get, "/api/databases", None).0, 200);
    assert_eq!(send(&gateway, Method::Get, "/nope", None).0, 404);
    let (status, body) = send(&gateway, Method::Get, "/api/databases", None);

    assert_eq!(status, 429);
    assert_eq!(body["success"], false);
}

#[test]
fn test_loopback_is_not_rate_limited() {
    let (_temp, gateway) = setup_gateway(1);
    let request = Request::new(Method::Get, "/api/databases");
    let localhost: IpAddr = "127.0.0.1".parse().unwrap();

    for _ in 0..5 {
        assert_eq!(gateway.handle(&request, localhost).status, 200);
    }
}

// =============================================================================
// Execute Endpoint Tests
// =============================================================================

#[test]
fn test_execute_endpoint() {
    let (_temp, gateway) = setup_gateway(100);

    let (status, body) = send(
        &gateway,
        Method::Post,
        "/api/execute",
        Some(json!({ "command": "create", "arguments": ["shop"] })),
    );
    assert_eq!(status, 200);
    assert_eq!(body["command"], "create");

    let (status, body) = send(
        &gateway,
        Method::Post,
        "/api/execute",
        Some(json!({ "command": "list" })),
    );
    assert_eq!(status, 200);
    assert_eq!(body["result"]["databases"], json!(["shop"]));
}

#[test]
fn test_execute_unknown_command_is_400() {
    let (_temp, gateway) = setup_gateway(100);

    let (status, body) = send(
        &gateway,
        Method::Post,
        "/api/execute",
        Some(json!({ "command": "explode", "arguments": [] })),
    );

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[test]
fn test_execute_stats_includes_rate_limit() {
    let (_temp, gateway) = setup_gateway(100);

    let (status, body) = send(
        &gateway,
        Method::Post,
        "/api/execute",
        Some(json!({ "command": "stats" })),
    );

    assert_eq!(status, 200);
    assert_eq!(body["result"]["rate_limit"]["max_requests"], 100);
    assert!(body["result"]["cache"].is_object());
}
