//! Response definitions
//!
//! Every response body is a JSON object carrying a `success` flag.

use serde_json::{json, Value};

use crate::error::SydbError;

/// A response to send to the client
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Extra headers; Content-Type/Length and Connection are added on encode
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// JSON response with an explicit status
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_string().into_bytes(),
        }
    }

    /// `{"success":true, ...fields}` with the given status
    pub fn success(status: u16, fields: Value) -> Self {
        let mut body = json!({ "success": true });
        if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), fields) {
            target.extend(extra);
        }
        Self::json(status, &body)
    }

    /// `{"success":true, ...fields}` with 200 OK
    pub fn ok(fields: Value) -> Self {
        Self::success(200, fields)
    }

    /// `{"success":false,"error":message}`
    pub fn failure(status: u16, message: &str) -> Self {
        Self::json(status, &json!({ "success": false, "error": message }))
    }

    /// Render an engine error with its mapped status code
    pub fn from_error(error: &SydbError) -> Self {
        Self::failure(error.status_code(), &error.to_string())
    }

    pub fn not_found() -> Self {
        Self::failure(404, "no such endpoint")
    }

    /// 405 with the Allow header listing supported methods
    pub fn method_not_allowed(allowed: &[&str]) -> Self {
        let mut response = Self::failure(405, "method not allowed");
        response
            .headers
            .push(("Allow".to_string(), allowed.join(", ")));
        response
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body back into JSON (used by clients and tests)
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Canonical reason phrase for a status code
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
