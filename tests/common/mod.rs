//! Shared test infrastructure for integration tests.

#![allow(dead_code)]

use serde_json::Value;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

/// One HTTP request as seen by the stub server.
#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl CapturedRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Single-shot HTTP stub: accepts exactly one request, replies with the
/// canned JSON, and hands the captured request back through `finish`.
pub struct StubServer {
    pub base_url: String,
    handle: JoinHandle<CapturedRequest>,
}

impl StubServer {
    pub fn spawn(response: Value) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let base_url = format!("http://{}", listener.local_addr().expect("stub addr"));
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept request");
            serve_one(stream, 200, &response)
        });
        StubServer { base_url, handle }
    }

    /// Wait for the request and return what the server saw.
    pub fn finish(self) -> CapturedRequest {
        self.handle.join().expect("stub server thread")
    }
}

/// Scripted HTTP stub: serves the given `(status, body)` responses to that
/// many consecutive requests, then hands all captures back through `finish`.
pub struct StubSequence {
    pub base_url: String,
    handle: JoinHandle<Vec<CapturedRequest>>,
}

impl StubSequence {
    pub fn spawn(responses: Vec<(u16, Value)>) -> StubSequence {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let base_url = format!("http://{}", listener.local_addr().expect("stub addr"));
        let handle = thread::spawn(move || {
            responses
                .into_iter()
                .map(|(status, response)| {
                    let (stream, _) = listener.accept().expect("accept request");
                    serve_one(stream, status, &response)
                })
                .collect()
        });
        StubSequence { base_url, handle }
    }

    /// Wait for every scripted request and return what the server saw.
    pub fn finish(self) -> Vec<CapturedRequest> {
        self.handle.join().expect("stub server thread")
    }
}

fn serve_one(stream: std::net::TcpStream, status: u16, response: &Value) -> CapturedRequest {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).expect("request line");
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("header line");
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            if key.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((key, value));
        }
    }

    let mut body_bytes = vec![0u8; content_length];
    reader.read_exact(&mut body_bytes).expect("request body");
    let body: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).expect("JSON request body")
    };

    let payload = serde_json::to_vec(response).expect("serialize response");
    let mut stream = reader.into_inner();
    let reason = match status {
        200 => "OK",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
    );
    stream.write_all(head.as_bytes()).expect("response head");
    stream.write_all(&payload).expect("response body");
    stream.flush().expect("flush response");

    CapturedRequest {
        method,
        path,
        headers,
        body,
    }
}
