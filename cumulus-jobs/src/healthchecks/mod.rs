//! Delivery of start/success/failure pings to a healthchecks.io compatible
//! endpoint.

use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

pub mod retry;

use retry::{RetryConfig, RetryError, RetryableError};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signal {
    Start,
    Success,
    Fail,
}

impl Signal {
    fn endpoint(&self) -> &'static str {
        match self {
            Signal::Start => "start",
            Signal::Success => "",
            Signal::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub job_name: String,
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid healthcheck URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to set up HTTP client")]
    Build(#[source] reqwest::Error),
    #[error("error sending healthcheck request to {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("healthcheck error {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("healthcheck failed after {attempts} retries")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },
}

impl RetryableError for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::Status { status, .. } => !(400..500).contains(status),
            _ => false,
        }
    }
}

impl From<RetryError<Error>> for Error {
    fn from(e: RetryError<Error>) -> Self {
        match e {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { attempts, last } => Error::Exhausted {
                attempts,
                last: Box::new(last),
            },
        }
    }
}

#[async_trait]
pub trait Monitor: Send + Sync {
    async fn signal(
        &self,
        base_url: &str,
        signal: Signal,
        rid: Uuid,
        payload: &Payload,
    ) -> Result<(), Error>;
}

/// Builds `<base>/<endpoint>?rid=<rid>`; the success endpoint is the base URL
/// itself.
pub fn signal_url(base_url: &str, signal: Signal, rid: Uuid) -> Result<Url, Error> {
    let invalid = |reason: String| Error::InvalidUrl {
        url: base_url.to_owned(),
        reason,
    };
    let mut url = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    let endpoint = signal.endpoint();
    if !endpoint.is_empty() {
        url.path_segments_mut()
            .map_err(|_| invalid("URL can't have a path".to_owned()))?
            .pop_if_empty()
            .push(endpoint);
    }
    url.query_pairs_mut()
        .append_pair("rid", &rid.hyphenated().to_string());
    Ok(url)
}

#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    retry: RetryConfig,
}

impl Client {
    pub const TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new() -> Result<Self, Error> {
        Self::with_retry(RetryConfig::default())
    }

    pub fn with_retry(retry: RetryConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(Error::Build)?;
        Ok(Client { http, retry })
    }

    async fn post(&self, url: &Url, body: &str) -> Result<(), Error> {
        let response = self
            .http
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_owned())
            .send()
            .await
            .map_err(|source| {
                tracing::warn!(url = %url, body, "failed to send healthcheck request: {}", source);
                Error::Transport {
                    url: url.to_string(),
                    source,
                }
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "delivered healthcheck signal");
            return Ok(());
        }
        let response_body = response.text().await.unwrap_or_default();
        tracing::warn!(
            url = %url,
            status = status.as_u16(),
            body,
            response = response_body.as_str(),
            "healthcheck request returned non-success status"
        );
        Err(Error::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: response_body.trim().to_owned(),
        })
    }
}

#[async_trait]
impl Monitor for Client {
    async fn signal(
        &self,
        base_url: &str,
        signal: Signal,
        rid: Uuid,
        payload: &Payload,
    ) -> Result<(), Error> {
        let url = signal_url(base_url, signal, rid)?;
        let body = serde_json::to_string(payload).map_err(|e| Error::InvalidUrl {
            url: base_url.to_owned(),
            reason: format!("unserializable payload: {}", e),
        })?;
        retry::retry(&self.retry, || self.post(&url, &body))
            .await
            .map_err(Error::from)
    }
}
