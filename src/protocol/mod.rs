//! Protocol Module
//!
//! Defines the wire protocol between HTTP clients and the gateway.
//!
//! ## Request Format
//! ```text
//! POST /api/databases/shop/collections/items/instances HTTP/1.1
//! Content-Type: application/json
//! Content-Length: 19
//!
//! {"title":"Widget"}
//! ```
//!
//! ## Response Format
//! ```text
//! HTTP/1.1 201 Created
//! Content-Type: application/json
//! Content-Length: ...
//! Connection: close
//!
//! {"success":true,"id":"..."}
//! ```
//!
//! Failures carry `{"success":false,"error":"..."}` and a 4xx/5xx status.

mod codec;
mod command;
mod request;
mod response;

pub use codec::{
    encode_request, encode_response, read_request, read_response, write_response, JSON_MIME,
    MAX_BODY_SIZE, MAX_HEADERS, MAX_LINE_LENGTH,
};
pub use command::{Command, ExecuteRequest};
pub use request::{Method, Request};
pub use response::{reason_phrase, Response};
