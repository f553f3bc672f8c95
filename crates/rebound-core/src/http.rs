//! HTTP client that retries requests through the retry executor.
//!
//! Uses the curl crate (libcurl). Each attempt runs one blocking transfer on
//! `spawn_blocking`; the request body is buffered once and re-sent on every
//! attempt. Transport failures go through [`Classify`]; responses with a
//! status accepted by [`is_retryable_http_status`] are marked retryable, any
//! other non-2xx status is final.

use crate::retry::{
    is_retryable_http_status, run_with_notify, AttemptError, Cancellation, Classify, ErrorKind,
    RetryError, RetryPolicy,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// A buffered HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new("POST", url).body(body)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.trim().to_string(), value.trim().to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Status and body of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u32,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Error from a single HTTP attempt.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("transfer failed: {0}")]
    Curl(#[from] curl::Error),
    #[error("HTTP {code}: {body}")]
    Status { code: u32, body: String },
    #[error("transfer task failed: {0}")]
    Join(String),
}

impl Classify for HttpError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            HttpError::Curl(e) => e.error_kind(),
            HttpError::InvalidUrl(_) | HttpError::Status { .. } | HttpError::Join(_) => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    policy: RetryPolicy,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            timeout: Duration::from_secs(30),
        }
    }

    /// Per-attempt transfer timeout (connect plus body).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying transient failures under the client's policy.
    pub async fn send(
        &self,
        cancel: &Cancellation,
        request: &Request,
    ) -> Result<Response, RetryError<HttpError>> {
        let shared = Arc::new(request.clone());
        let timeout = self.timeout;
        run_with_notify(
            cancel,
            &self.policy,
            || attempt(Arc::clone(&shared), timeout),
            |err, wait| {
                tracing::debug!(
                    method = %request.method,
                    url = %request.url,
                    error = %err,
                    wait_ms = wait.as_millis() as u64,
                    "retrying http request"
                );
            },
        )
        .await
    }
}

async fn attempt(request: Arc<Request>, timeout: Duration) -> Result<Response, AttemptError<HttpError>> {
    let response = tokio::task::spawn_blocking(move || perform(&request, timeout))
        .await
        .map_err(|e| HttpError::Join(e.to_string()))??;

    if (200..300).contains(&response.status) {
        return Ok(response);
    }
    let err = HttpError::Status {
        code: response.status,
        body: response.text(),
    };
    if is_retryable_http_status(response.status) {
        Err(AttemptError::Retryable(err))
    } else {
        Err(AttemptError::Failed(err))
    }
}

/// One blocking transfer. Runs in the current thread.
fn perform(request: &Request, timeout: Duration) -> Result<Response, HttpError> {
    let url = url::Url::parse(&request.url)?;

    let mut easy = curl::easy::Easy::new();
    easy.url(url.as_str())?;
    easy.follow_location(true)?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout)?;

    match (request.method.as_str(), &request.body) {
        ("GET", None) => easy.get(true)?,
        ("HEAD", None) => easy.nobody(true)?,
        (method, body) => {
            if method != "POST" {
                easy.custom_request(method)?;
            }
            // Always set fields so libcurl never falls back to reading stdin.
            easy.post_fields_copy(body.as_deref().unwrap_or(&[]))?;
        }
    }

    if !request.headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k, v))?;
        }
        easy.http_headers(list)?;
    }

    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    tracing::trace!(method = %request.method, url = %request.url, status, "http response");
    Ok(Response { status, body })
}
