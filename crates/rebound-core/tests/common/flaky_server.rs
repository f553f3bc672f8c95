//! Minimal HTTP/1.1 server that replays a scripted sequence of responses.
//!
//! The n-th request gets the n-th scripted response; once the script runs
//! out, the last entry repeats. Request bodies are recorded so tests can check
//! that retries re-send the same payload.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub struct Scripted {
    pub status: u16,
    pub body: String,
}

pub fn reply(status: u16, body: &str) -> Scripted {
    Scripted {
        status,
        body: body.to_string(),
    }
}

/// Handle to a running server. The server runs until the process exits.
#[derive(Clone)]
pub struct FlakyServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<String>>>,
}

impl FlakyServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. Returns its handle with the base
/// URL (e.g. "http://127.0.0.1:12345/").
pub fn start(script: Vec<Scripted>) -> FlakyServer {
    assert!(!script.is_empty(), "script needs at least one response");
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = FlakyServer {
        url: format!("http://127.0.0.1:{}/", port),
        hits: Arc::new(AtomicUsize::new(0)),
        bodies: Arc::new(Mutex::new(Vec::new())),
    };
    let script = Arc::new(script);
    let handle = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let script = Arc::clone(&script);
            let handle = handle.clone();
            thread::spawn(move || serve(stream, &script, &handle));
        }
    });
    server
}

/// A URL on which nothing listens (connection refused).
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

fn serve(mut stream: TcpStream, script: &[Scripted], server: &FlakyServer) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let body = match read_request(&mut stream) {
        Some(body) => body,
        None => return,
    };
    let n = server.hits.fetch_add(1, Ordering::SeqCst);
    server.bodies.lock().unwrap().push(body);

    let entry = &script[n.min(script.len() - 1)];
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        entry.status,
        reason(entry.status),
        entry.body.len(),
        entry.body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

/// Reads headers plus `Content-Length` bytes of body; returns the body.
fn read_request(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = std::str::from_utf8(&buf[..header_end]).ok()?;
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_end + content_length);
    Some(String::from_utf8_lossy(&buf[header_end..end]).into_owned())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}
