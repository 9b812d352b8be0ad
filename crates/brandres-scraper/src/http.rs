//! The HTTP capability every adapter and the validator fetch through.
//!
//! [`HttpFetch`] is the seam: production wires [`ReqwestFetcher`] wrapped in
//! a [`ThrottledFetcher`], tests substitute in-memory doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::error::ScraperError;
use crate::origin::extract_host;
use crate::rate_limit::HostThrottle;

pub const BROWSER_FALLBACK_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Bodies larger than this are refused; no logo needs 10 MiB.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            timeout,
        }
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// A completed response of any status. Callers decide what a non-2xx means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after following redirects.
    pub final_url: String,
    /// Header names are lowercased.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Media type without parameters, lowercased.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait HttpFetch: Send + Sync {
    /// Issues a GET, following redirects.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Timeout`] or [`ScraperError::Network`] when no
    /// response arrives. Non-2xx statuses are returned as `Ok`.
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, ScraperError>;
}

/// [`HttpFetch`] backed by a shared `reqwest::Client`.
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Creates a fetcher that sends `user_agent` unless a request overrides it.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ClientBuild`] if the underlying `reqwest::Client`
    /// cannot be constructed (e.g., invalid TLS config).
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, ScraperError> {
        let mut builder = self.client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&request.url, &e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect::<Vec<_>>();

        if response
            .content_length()
            .is_some_and(|len| len > MAX_BODY_BYTES as u64)
        {
            return Err(ScraperError::Rejected {
                url: final_url,
                reason: "response body exceeds size limit".to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(&request.url, &e))?;
        if body.len() > MAX_BODY_BYTES {
            return Err(ScraperError::Rejected {
                url: final_url,
                reason: "response body exceeds size limit".to_string(),
            });
        }

        Ok(HttpResponse {
            status,
            final_url,
            headers,
            body: body.to_vec(),
        })
    }
}

fn classify_reqwest_error(url: &str, err: &reqwest::Error) -> ScraperError {
    if err.is_timeout() {
        ScraperError::Timeout {
            url: url.to_owned(),
        }
    } else {
        ScraperError::Network {
            url: url.to_owned(),
            message: err.to_string(),
        }
    }
}

/// Wraps another fetcher with per-host spacing and run cancellation.
///
/// Cancellation only stops new requests; a request already past the
/// throttle runs to completion.
pub struct ThrottledFetcher {
    inner: Arc<dyn HttpFetch>,
    throttle: HostThrottle,
    cancel: CancellationToken,
}

impl ThrottledFetcher {
    #[must_use]
    pub fn new(inner: Arc<dyn HttpFetch>, spacing: Duration, cancel: CancellationToken) -> Self {
        Self {
            inner,
            throttle: HostThrottle::new(spacing),
            cancel,
        }
    }
}

#[async_trait]
impl HttpFetch for ThrottledFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, ScraperError> {
        let cancelled = || ScraperError::Cancelled {
            url: request.url.clone(),
        };
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        let host = extract_host(&request.url).ok_or_else(|| ScraperError::InvalidUrl {
            url: request.url.clone(),
            reason: "not an absolute http(s) URL".to_string(),
        })?;
        tokio::select! {
            () = self.cancel.cancelled() => return Err(cancelled()),
            () = self.throttle.wait(&host) => {}
        }
        self.inner.fetch(request).await
    }
}
