//! Protocol codec
//!
//! HTTP/1.1 framing for requests and responses.
//!
//! ## Wire Format
//! ```text
//! METHOD /path?query HTTP/1.1\r\n
//! Header-Name: value\r\n
//! ...
//! \r\n
//! body (Content-Length bytes)
//! ```
//!
//! One request per connection: responses always carry `Connection: close`.

use std::io::{BufRead, Read, Write};

use crate::error::{Result, SydbError};

use super::request::{Method, Request};
use super::response::{reason_phrase, Response};

/// Maximum length of the request line or any header line
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 100;

/// Maximum body size (16 MB)
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// JSON MIME type
pub const JSON_MIME: &str = "application/json";

// =============================================================================
// Request Decoding/Encoding
// =============================================================================

/// Read a complete request from a stream
///
/// Blocks until the headers and `Content-Length` body bytes are received.
pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Request> {
    let request_line = read_line(reader)?.ok_or_else(|| {
        SydbError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed before request line",
        ))
    })?;

    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v)) => (m, t, v),
        _ => {
            return Err(SydbError::Protocol(format!(
                "malformed request line '{}'",
                request_line
            )))
        }
    };
    if !version.starts_with("HTTP/1.") {
        return Err(SydbError::Protocol(format!(
            "unsupported HTTP version '{}'",
            version
        )));
    }
    if !target.starts_with('/') {
        return Err(SydbError::Protocol(format!(
            "request target '{}' is not an absolute path",
            target
        )));
    }

    let mut request = Request::new(method.parse::<Method>()?, target);
    request.headers = read_headers(reader)?;

    let content_length = content_length(&request.headers)?;
    if content_length > 0 {
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body)?;
        request.body = body;
    }

    Ok(request)
}

/// Encode a request to bytes (used by clients and tests)
pub fn encode_request(request: &Request) -> Vec<u8> {
    let target = match &request.query {
        Some(query) => format!("{}?{}", request.path, query),
        None => request.path.clone(),
    };

    let mut head = format!("{} {} HTTP/1.1\r\n", request.method, target);
    for (name, value) in &request.headers {
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str(&format!("Content-Length: {}\r\n\r\n", request.body.len()));

    let mut message = head.into_bytes();
    message.extend_from_slice(&request.body);
    message
}

// =============================================================================
// Response Decoding/Encoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Vec<u8> {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason_phrase(response.status),
        JSON_MIME,
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let mut message = head.into_bytes();
    message.extend_from_slice(&response.body);
    message
}

/// Read a complete response from a stream (used by clients and tests)
pub fn read_response<R: BufRead>(reader: &mut R) -> Result<Response> {
    let status_line = read_line(reader)?
        .ok_or_else(|| SydbError::Protocol("connection closed before status line".to_string()))?;

    let mut parts = status_line.splitn(3, ' ');
    let status = match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/1.") => {
            code.parse::<u16>().map_err(|_| {
                SydbError::Protocol(format!("bad status code in '{}'", status_line))
            })?
        }
        _ => {
            return Err(SydbError::Protocol(format!(
                "malformed status line '{}'",
                status_line
            )))
        }
    };

    let headers = read_headers(reader)?;
    let length = content_length(&headers)?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body)?;

    let headers = headers
        .into_iter()
        .filter(|(name, _)| !matches!(name.as_str(), "content-length" | "content-type" | "connection"))
        .collect();

    Ok(Response {
        status,
        headers,
        body,
    })
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response))?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Read one CRLF (or LF) terminated line; `None` on clean EOF
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LENGTH as u64 + 1)
        .read_until(b'\n', &mut line)?;

    if read == 0 {
        return Ok(None);
    }
    if line.len() > MAX_LINE_LENGTH {
        return Err(SydbError::Protocol(format!(
            "line exceeds {} bytes",
            MAX_LINE_LENGTH
        )));
    }
    if line.last() != Some(&b'\n') {
        return Err(SydbError::Protocol("unterminated line".to_string()));
    }

    while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
        line.pop();
    }
    String::from_utf8(line)
        .map(Some)
        .map_err(|_| SydbError::Protocol("line is not valid UTF-8".to_string()))
}

fn read_headers<R: BufRead>(reader: &mut R) -> Result<Vec<(String, String)>> {
    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)?
            .ok_or_else(|| SydbError::Protocol("connection closed inside headers".to_string()))?;
        if line.is_empty() {
            return Ok(headers);
        }
        if headers.len() >= MAX_HEADERS {
            return Err(SydbError::Protocol(format!(
                "more than {} headers",
                MAX_HEADERS
            )));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| SydbError::Protocol(format!("malformed header '{}'", line)))?;
        headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
    }
}

fn content_length(headers: &[(String, String)]) -> Result<usize> {
    let Some((_, value)) = headers.iter().find(|(name, _)| name == "content-length") else {
        return Ok(0);
    };
    let length: usize = value
        .parse()
        .map_err(|_| SydbError::Protocol(format!("invalid Content-Length '{}'", value)))?;
    if length > MAX_BODY_SIZE {
        return Err(SydbError::Protocol(format!(
            "body too large: {} bytes (max {})",
            length, MAX_BODY_SIZE
        )));
    }
    Ok(length)
}
