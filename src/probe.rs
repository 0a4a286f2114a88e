use reqwest::header;
use reqwest::redirect::Policy;
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::ScanConfig;
use crate::error::Result;

/// Transport-level failure classification for one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeError {
    /// Request exceeded the per-request timeout
    Timeout,
    /// Connection refused/reset or DNS resolution failed
    Unreachable,
    /// Any other transport or protocol failure
    Other(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Timeout => write!(f, "timeout"),
            ProbeError::Unreachable => write!(f, "unreachable"),
            ProbeError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// Normalized result of a single HTTP request. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub status: Option<u16>,
    pub content_length: Option<u64>,
    pub redirect_location: Option<String>,
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
}

impl ProbeOutcome {
    /// Outcome for a request that never produced a response.
    pub fn failure(error: ProbeError, elapsed: Duration) -> Self {
        Self {
            status: None,
            content_length: None,
            redirect_location: None,
            elapsed,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Issues single classified GET requests through one shared client.
///
/// Redirects are recorded, not followed, unless a follow depth is configured.
/// Retries are a dispatcher concern; the prober performs exactly one request
/// per call.
#[derive(Debug)]
pub struct Prober {
    client: reqwest::Client,
}

impl Prober {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let redirect_policy = match config.redirect_depth.unwrap_or(0) {
            0 => Policy::none(),
            depth => Policy::limited(depth),
        };

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout_duration())
            .redirect(redirect_policy)
            .pool_max_idle_per_host(config.worker_count().min(20))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60));

        if config.skip_tls_verification.unwrap_or(false) {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Probe one URL with the given identity. One network request, no retries.
    pub async fn probe(&self, url: &Url, user_agent: &str) -> ProbeOutcome {
        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, user_agent)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                let redirect_location = if status.is_redirection() {
                    resp.headers()
                        .get(header::LOCATION)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string)
                } else {
                    None
                };
                // Chunked responses carry no Content-Length header; fall back
                // to counting body bytes, matching what a browser would see.
                let content_length = match resp.content_length() {
                    Some(length) => Some(length),
                    None => resp.bytes().await.ok().map(|body| body.len() as u64),
                };

                ProbeOutcome {
                    status: Some(status.as_u16()),
                    content_length,
                    redirect_location,
                    elapsed: started.elapsed(),
                    error: None,
                }
            }
            Err(err) => {
                let kind = if err.is_timeout() {
                    ProbeError::Timeout
                } else if err.is_connect() {
                    ProbeError::Unreachable
                } else {
                    let description = std::error::Error::source(&err)
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| err.to_string());
                    ProbeError::Other(description)
                };
                ProbeOutcome::failure(kind, started.elapsed())
            }
        }
    }
}
