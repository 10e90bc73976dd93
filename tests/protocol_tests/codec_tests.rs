//! Codec Tests
//!
//! Tests for HTTP request/response framing and admin command parsing.

use std::io::Cursor;

use serde_json::json;
use sydb::error::SydbError;
use sydb::protocol::{
    encode_request, encode_response, read_request, read_response, reason_phrase, write_response,
    Command, ExecuteRequest, Method, Request, Response, MAX_BODY_SIZE, MAX_LINE_LENGTH,
};
use sydb::schema::FieldType;

// =============================================================================
// Request Decoding Tests
// =============================================================================

#[test]
fn test_read_request_with_body() {
    let raw = "POST /api/databases HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 15\r\n\r\n{\"name\":\"shop\"}";
    let mut reader = Cursor::new(raw.as_bytes());

    let request = read_request(&mut reader).unwrap();

    assert_eq!(request.method, Method::Post);
    assert_eq!(request.path, "/api/databases");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("HOST"), Some("localhost"));
    assert_eq!(request.body_str(), r#"{"name":"shop"}"#);
}

#[test]
fn test_read_request_splits_query() {
    let raw = "GET /api/databases/shop/collections/items/instances?query=title%3AWidget HTTP/1.1\r\n\r\n";
    let mut reader = Cursor::new(raw.as_bytes());

    let request = read_request(&mut reader).unwrap();

    assert_eq!(request.path, "/api/databases/shop/collections/items/instances");
    assert_eq!(request.query.as_deref(), Some("query=title%3AWidget"));
    assert_eq!(request.query_param("query").as_deref(), Some("title:Widget"));
    assert!(request.body.is_empty());
}

#[test]
fn test_read_request_accepts_bare_lf() {
    let raw = "DELETE /api/databases/shop HTTP/1.0\nContent-Length: 0\n\n";
    let mut reader = Cursor::new(raw.as_bytes());

    let request = read_request(&mut reader).unwrap();

    assert_eq!(request.method, Method::Delete);
    assert_eq!(request.path, "/api/databases/shop");
}

#[test]
fn test_encode_then_read_request() {
    let original = Request::new(Method::Put, "/api/x?query=a:1").with_body(r#"{"qty":4}"#);

    let encoded = encode_request(&original);
    let decoded = read_request(&mut Cursor::new(encoded)).unwrap();

    assert_eq!(decoded.method, Method::Put);
    assert_eq!(decoded.path, "/api/x");
    assert_eq!(decoded.query.as_deref(), Some("query=a:1"));
    assert_eq!(decoded.body, original.body);
}

// =============================================================================
// Request Error Tests
// =============================================================================

#[test]
fn test_malformed_request_line() {
    let mut reader = Cursor::new(b"GARBAGE\r\n\r\n".to_vec());

    let result = read_request(&mut reader);

    assert!(matches!(result, Err(SydbError::Protocol(_))));
}

#[test]
fn test_unsupported_version_and_target() {
    let mut v2 = Cursor::new(b"GET / HTTP/2\r\n\r\n".to_vec());
    let mut absolute = Cursor::new(b"GET http://x/ HTTP/1.1\r\n\r\n".to_vec());

    assert!(matches!(read_request(&mut v2), Err(SydbError::Protocol(_))));
    assert!(matches!(read_request(&mut absolute), Err(SydbError::Protocol(_))));
}

#[test]
fn test_lowercase_method_rejected() {
    let mut reader = Cursor::new(b"get / HTTP/1.1\r\n\r\n".to_vec());

    assert!(matches!(read_request(&mut reader), Err(SydbError::Protocol(_))));
}

#[test]
fn test_oversized_body_rejected() {
    let raw = format!(
        "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
        MAX_BODY_SIZE + 1
    );

    let result = read_request(&mut Cursor::new(raw.into_bytes()));

    assert!(matches!(result, Err(SydbError::Protocol(_))));
}

#[test]
fn test_overlong_line_rejected() {
    let raw = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(MAX_LINE_LENGTH));

    let result = read_request(&mut Cursor::new(raw.into_bytes()));

    assert!(matches!(result, Err(SydbError::Protocol(_))));
}

#[test]
fn test_truncated_body_is_io_error() {
    let raw = "POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";

    let result = read_request(&mut Cursor::new(raw.as_bytes()));

    assert!(matches!(result, Err(SydbError::Io(_))));
}

#[test]
fn test_empty_stream_is_eof() {
    let result = read_request(&mut Cursor::new(Vec::new()));

    match result {
        Err(SydbError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("Expected EOF, got {:?}", other),
    }
}

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_encode_response_headers() {
    let response = Response::success(201, json!({ "id": "abc" }));

    let text = String::from_utf8(encode_response(&response)).unwrap();

    assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(text.contains("Content-Type: application/json\r\n"));
    assert!(text.contains("Connection: close\r\n"));
    assert!(text.ends_with(r#"{"success":true,"id":"abc"}"#));
}

#[test]
fn test_write_then_read_response() {
    let response = Response::method_not_allowed(&["GET", "POST"]);
    let mut buffer = Vec::new();

    write_response(&mut buffer, &response).unwrap();
    let decoded = read_response(&mut Cursor::new(buffer)).unwrap();

    assert_eq!(decoded.status, 405);
    assert_eq!(decoded.header("allow"), Some("GET, POST"));
    assert_eq!(
        decoded.body_json().unwrap(),
        json!({ "success": false, "error": "method not allowed" })
    );
}

#[test]
fn test_error_responses_use_mapped_status() {
    let cases = [
        (SydbError::Validation("x".into()), 400),
        (SydbError::NotFound("x".into()), 404),
        (SydbError::AlreadyExists("x".into()), 409),
        (SydbError::RateLimited("x".into()), 429),
        (SydbError::Overloaded("x".into()), 503),
        (SydbError::CorruptFile("x".into()), 500),
    ];

    for (error, status) in cases {
        let response = Response::from_error(&error);
        assert_eq!(response.status, status);
        assert_eq!(response.body_json().unwrap()["success"], false);
    }
    assert_eq!(reason_phrase(429), "Too Many Requests");
}

// =============================================================================
// Command Parsing Tests
// =============================================================================

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_parse_list_variants() {
    assert_eq!(Command::parse("list", &[]).unwrap(), Command::ListDatabases);
    assert_eq!(
        Command::parse("list", &args(&["shop"])).unwrap(),
        Command::ListCollections {
            database: "shop".to_string()
        }
    );
    assert_eq!(
        Command::parse("list", &args(&["shop", "items"])).unwrap(),
        Command::ListInstances {
            database: "shop".to_string(),
            collection: "items".to_string()
        }
    );
}

#[test]
fn test_parse_create_with_schema() {
    let command = Command::parse(
        "create",
        &args(&["shop", "items", "--schema", "title-string-req", "price-float-idx"]),
    )
    .unwrap();

    match command {
        Command::CreateCollection { fields, .. } => {
            assert_eq!(fields.len(), 2);
            assert!(fields[0].required);
            assert_eq!(fields[1].field_type, FieldType::Float);
            assert!(fields[1].indexed);
        }
        other => panic!("Expected CreateCollection, got {:?}", other),
    }
}

#[test]
fn test_parse_find_and_delete() {
    assert_eq!(
        Command::parse("find", &args(&["shop", "items", "--where", "qty:3"])).unwrap(),
        Command::FindInstances {
            database: "shop".to_string(),
            collection: "items".to_string(),
            query: "qty:3".to_string()
        }
    );
    assert_eq!(
        Command::parse("delete", &args(&["shop", "items", "abc"])).unwrap(),
        Command::DeleteInstance {
            database: "shop".to_string(),
            collection: "items".to_string(),
            id: "abc".to_string()
        }
    );
}

#[test]
fn test_parse_wrong_arity() {
    assert!(matches!(
        Command::parse("schema", &args(&["shop"])),
        Err(SydbError::Validation(_))
    ));
    assert!(matches!(
        Command::parse("create", &args(&["shop", "items", "--schema"])),
        Err(SydbError::Validation(_))
    ));
}

#[test]
fn test_execute_request_defaults_arguments() {
    let request: ExecuteRequest = serde_json::from_str(r#"{"command":"stats"}"#).unwrap();

    assert!(request.arguments.is_empty());
    assert_eq!(Command::try_from(request).unwrap(), Command::Stats);
}
