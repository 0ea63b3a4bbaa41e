//! Rate-limited HTTP fetching with bounded retry.
//!
//! Every source scraper and the batch uploader talk to the network through a
//! [`Transport`]. The production transport wraps a `reqwest` client; tests
//! substitute scripted transports.
//!
//! # Retry Strategy
//!
//! [`Fetcher::fetch_with_retry`] makes up to `max_retries` attempts:
//!
//! - HTTP 429: wait `rate_limit_step × attempt`, then retry
//! - any other non-2xx: the attempt fails with [`FetchError::HttpStatus`],
//!   wait `error_step × attempt`, then retry
//! - transport failure: wait `error_step × attempt`, then retry
//!
//! When the budget is spent the last error is wrapped in
//! [`FetchError::Exhausted`].
//!
//! [`Fetcher::fetch_lookup`] follows the same schedule except that HTTP 404
//! is a definite "no such record" and comes back at once as `Ok`.

use crate::errors::FetchError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Per-request timeout applied by [`ReqwestTransport`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of attempts for [`Fetcher::fetch_with_retry`].
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const USER_AGENT: &str = concat!("catalog_scrape/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outgoing request, independent of the HTTP client in use.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_str(&self.body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// Sends a single request, no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, FetchError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, FetchError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Retrying front end over a shared [`Transport`].
///
/// Cheap to clone; every scraper holds its own handle.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    /// Multiplied by the attempt number after an HTTP 429.
    rate_limit_step: Duration,
    /// Multiplied by the attempt number after any other failure.
    error_step: Duration,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("rate_limit_step", &self.rate_limit_step)
            .field("error_step", &self.error_step)
            .finish()
    }
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            rate_limit_step: Duration::from_secs(5),
            error_step: Duration::from_secs(1),
        }
    }

    /// Issue `request`, retrying per the module-level strategy.
    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    pub async fn fetch_with_retry(
        &self,
        request: &RequestSpec,
        max_retries: u32,
    ) -> Result<HttpResponse, FetchError> {
        self.attempt(request, max_retries, false).await
    }

    /// Look up a single record by key.
    ///
    /// A 404 answers the lookup and is returned without retrying; the caller
    /// checks `resp.status`. Everything else retries as in
    /// [`fetch_with_retry`](Self::fetch_with_retry).
    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    pub async fn fetch_lookup(
        &self,
        request: &RequestSpec,
        max_retries: u32,
    ) -> Result<HttpResponse, FetchError> {
        self.attempt(request, max_retries, true).await
    }

    async fn attempt(
        &self,
        request: &RequestSpec,
        max_retries: u32,
        not_found_is_answer: bool,
    ) -> Result<HttpResponse, FetchError> {
        let total_t0 = Instant::now();
        let max_retries = max_retries.max(1);
        let mut last = FetchError::Transport("no attempt made".to_string());

        for attempt in 1..=max_retries {
            let delay = match self.transport.send(request).await {
                Ok(resp) if resp.is_success() => return Ok(resp),
                Ok(resp) if not_found_is_answer && resp.status == 404 => return Ok(resp),
                Ok(resp) if resp.status == 429 => {
                    last = FetchError::HttpStatus { status: 429 };
                    self.rate_limit_step * attempt
                }
                Ok(resp) => {
                    last = FetchError::HttpStatus {
                        status: resp.status,
                    };
                    self.error_step * attempt
                }
                Err(e) => {
                    last = e;
                    self.error_step * attempt
                }
            };

            if attempt == max_retries {
                break;
            }
            warn!(
                attempt,
                max = max_retries,
                ?delay,
                error = %last,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }

        error!(
            attempts = max_retries,
            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
            error = %last,
            "fetch exhausted retries"
        );
        Err(FetchError::Exhausted {
            attempts: max_retries,
            last: Box::new(last),
        })
    }

    /// [`fetch_with_retry`](Self::fetch_with_retry) with the default budget,
    /// decoding the body as JSON.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: &RequestSpec,
    ) -> Result<T, FetchError> {
        self.fetch_with_retry(request, DEFAULT_MAX_RETRIES)
            .await?
            .json()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transports shared by tests across the crate.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Reply = Result<HttpResponse, FetchError>;

    pub fn ok(body: impl Into<String>) -> Reply {
        Ok(HttpResponse {
            status: 200,
            body: body.into(),
        })
    }

    pub fn status(code: u16) -> Reply {
        Ok(HttpResponse {
            status: code,
            body: String::new(),
        })
    }

    pub fn down() -> Reply {
        Err(FetchError::Transport("connection refused".into()))
    }

    /// Answers requests from per-route queues, matched by URL substring in
    /// registration order. A route whose queue is down to its last reply
    /// keeps repeating it. Unmatched URLs get a 404.
    #[derive(Default)]
    pub struct ScriptedTransport {
        routes: Mutex<Vec<(String, VecDeque<Reply>)>>,
        log: Mutex<Vec<RequestSpec>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(self, needle: &str, replies: Vec<Reply>) -> Self {
            self.routes
                .lock()
                .unwrap()
                .push((needle.to_string(), replies.into()));
            self
        }

        pub fn requests(&self) -> Vec<RequestSpec> {
            self.log.lock().unwrap().clone()
        }

        pub fn count(&self, needle: &str) -> usize {
            self.requests()
                .iter()
                .filter(|r| r.url.contains(needle))
                .count()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, FetchError> {
            self.log.lock().unwrap().push(request.clone());
            let mut routes = self.routes.lock().unwrap();
            for (needle, replies) in routes.iter_mut() {
                if request.url.contains(needle.as_str()) {
                    return match replies.len() {
                        0 => status(404),
                        1 => replies[0].clone(),
                        _ => replies.pop_front().unwrap(),
                    };
                }
            }
            status(404)
        }
    }
}
