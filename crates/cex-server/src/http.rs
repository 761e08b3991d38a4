//! Minimal HTTP/1.1 framing: one request per connection, `Connection: close`.

use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;

use serde_json::Value;

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Builds a request from a method and a raw target such as `/api/search?q=sao`.
    pub fn new(method: &str, target: &str, body: impl Into<Vec<u8>>) -> Self {
        let (path, query) = parse_path_query(target);
        Self {
            method: method.to_ascii_uppercase(),
            path,
            query,
            body: body.into(),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new("GET", target, Vec::new())
    }

    pub fn post_json(target: &str, body: &Value) -> Self {
        Self::new("POST", target, body.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, value: &Value) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Vec::new(),
        }
    }

    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Outcome of reading one request off a connection.
#[derive(Debug)]
pub enum Incoming {
    Request(HttpRequest),
    /// Unusable framing; answered with a 400 carrying this reason.
    Rejected(&'static str),
    /// The peer hung up or stayed idle before sending a request line.
    Closed,
}

pub fn read_request<R: BufRead>(reader: &mut R) -> io::Result<Incoming> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => return Ok(Incoming::Closed),
        Ok(_) => {}
        Err(err) if is_timeout(&err) => return Ok(Incoming::Closed),
        Err(err) => return Err(err),
    }
    if line.trim().is_empty() {
        return Ok(Incoming::Closed);
    }
    let Some((method, target)) = parse_request_line(&line) else {
        return Ok(Incoming::Rejected("malformed request line"));
    };

    let content_length = match read_content_length(reader)? {
        Some(n) if n <= MAX_BODY_BYTES => n,
        Some(_) => return Ok(Incoming::Rejected("request body too large")),
        None => return Ok(Incoming::Rejected("invalid Content-Length header")),
    };
    let mut body = vec![0_u8; content_length];
    reader.read_exact(&mut body)?;

    Ok(Incoming::Request(HttpRequest::new(method, target, body)))
}

fn parse_request_line(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    Some((method, target))
}

/// Drains the header block. `None` when Content-Length is not a number.
fn read_content_length<R: BufRead>(reader: &mut R) -> io::Result<Option<usize>> {
    let mut length = Some(0);
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                length = value.trim().parse::<usize>().ok();
            }
        }
    }
    Ok(length)
}

pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

pub fn write_http_response(stream: &mut TcpStream, response: &HttpResponse) -> io::Result<()> {
    let reason = http_reason_phrase(response.status);
    let headers = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nAccess-Control-Allow-Methods: GET, POST, OPTIONS\r\nAccess-Control-Allow-Headers: Content-Type\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    );
    stream.write_all(headers.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()
}

pub fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "OK",
    }
}

pub fn parse_path_query(raw: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = match raw.split_once('?') {
        Some((p, q)) => (p.to_string(), q),
        None => (raw.to_string(), ""),
    };
    let mut query = HashMap::new();
    for pair in query_str.split('&') {
        if pair.is_empty() {
            continue;
        }
        if let Some((k, v)) = pair.split_once('=') {
            query.insert(decode_component(k), decode_component(v));
        } else {
            query.insert(decode_component(pair), String::new());
        }
    }
    (path, query)
}

/// Percent-decodes a query component; `+` is a space. Invalid UTF-8 keeps the raw text.
pub fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or(spaced.clone(), |s| s.into_owned())
}
