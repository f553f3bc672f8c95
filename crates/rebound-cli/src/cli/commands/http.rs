//! `rebound http` – retrying HTTP client against a local server that is
//! unavailable for its first two requests.

use super::resolve_policy;
use anyhow::{Context, Result};
use rebound_core::config::ReboundConfig;
use rebound_core::http::{HttpClient, Request};
use rebound_core::retry::Cancellation;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve on an ephemeral port: 503 for the first two requests, then a JSON 200.
async fn spawn_demo_server() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let hits = Arc::new(AtomicU32::new(0));
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let hits = Arc::clone(&hits);
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                if stream.read(&mut buf).await.unwrap_or(0) == 0 {
                    return;
                }
                let n = hits.fetch_add(1, Ordering::SeqCst) + 1;
                println!("  Server received request {}", n);
                let (status, body) = if n < 3 {
                    ("503 Service Unavailable", "Service temporarily unavailable".to_string())
                } else {
                    let payload = serde_json::json!({
                        "status": "success",
                        "message": "Payment processed",
                    });
                    ("200 OK", payload.to_string())
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });
    Ok(format!("http://{}/", addr))
}

pub async fn run_http(cfg: &ReboundConfig, profile: Option<&str>, cancel: &Cancellation) -> Result<()> {
    let policy = resolve_policy(cfg, profile, "fast")?;
    let base = spawn_demo_server().await?;
    let client = HttpClient::new(policy).with_timeout(cfg.http_timeout());

    let request = Request::post(&format!("{}payment", base), r#"{"amount": 100}"#)
        .header("Content-Type", "application/json");
    match client.send(cancel, &request).await {
        Ok(response) => {
            let result: HashMap<String, String> = response.json().context("decode response body")?;
            println!("  Final result: {:?}", result);
        }
        Err(err) => println!("  Request failed after {} attempt(s): {}", err.attempts(), err),
    }
    Ok(())
}
