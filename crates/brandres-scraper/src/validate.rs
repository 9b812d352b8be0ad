//! Fetch & validate worker pool.
//!
//! Every asset reference is fetched, checked to be an image, decoded and
//! fingerprinted. A semaphore shared by all brands bounds how many
//! validations run at once; per-host spacing and cancellation live in the
//! fetcher this pool is given.

use std::sync::Arc;
use std::time::Duration;

use brandres_core::{AssetRef, ErrorKind, ValidationResult};
use futures::future::join_all;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

use crate::decode::ImageDecoder;
use crate::error::ScraperError;
use crate::geo::geo_block_indicator;
use crate::http::{HttpFetch, HttpRequest, HttpResponse};
use crate::rate_limit::retry_with_backoff;

const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/svg+xml,image/*,*/*;q=0.8";

pub struct Validator {
    http: Arc<dyn HttpFetch>,
    decoder: Arc<dyn ImageDecoder>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Validator {
    #[must_use]
    pub fn new(
        http: Arc<dyn HttpFetch>,
        decoder: Arc<dyn ImageDecoder>,
        workers: usize,
        timeout: Duration,
        max_retries: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            http,
            decoder,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            timeout,
            max_retries,
            retry_backoff,
        }
    }

    /// Validates all assets concurrently, within the worker bound.
    /// Results come back in input order.
    pub async fn validate_all(&self, assets: Vec<AssetRef>) -> Vec<ValidationResult> {
        join_all(assets.into_iter().map(|asset| self.validate(asset))).await
    }

    /// Validates one asset. Never fails: problems are recorded on the
    /// result's `error_kind`.
    pub async fn validate(&self, asset: AssetRef) -> ValidationResult {
        // The semaphore is never closed.
        let _permit = self.permits.acquire().await.ok();

        let mut result = ValidationResult {
            asset,
            accessible: false,
            http_status: None,
            final_url: None,
            image: None,
            content_hash: None,
            error_kind: None,
        };

        if let Err(err) = self.check(&mut result).await {
            if let ScraperError::HttpStatus { status, .. } = &err {
                result.http_status = Some(*status);
            }
            if matches!(err, ScraperError::GeoBlocked { .. }) {
                tracing::warn!(
                    brand = %result.asset.brand_id,
                    url = %result.asset.url,
                    geo_blocked = true,
                    error = %err,
                    "asset request landed on a geo-block page"
                );
            } else {
                tracing::debug!(
                    brand = %result.asset.brand_id,
                    url = %result.asset.url,
                    source = %result.asset.source_type,
                    error = %err,
                    "asset failed validation"
                );
            }
            result.error_kind = Some(err.kind().unwrap_or(ErrorKind::Rejected));
        }
        result
    }

    async fn check(&self, result: &mut ValidationResult) -> Result<(), ScraperError> {
        let url = result.asset.url.clone();
        let response = retry_with_backoff(self.max_retries, self.retry_backoff, || {
            self.fetch_image(&url)
        })
        .await?;

        result.accessible = true;
        result.http_status = Some(response.status);
        result.final_url = Some(response.final_url.clone());

        let content_type = response.content_type();
        let Some(ct) = content_type.as_deref() else {
            return Err(ScraperError::NotAnImage {
                url,
                content_type: None,
            });
        };
        let plausible = ct.starts_with("image/") || ct == "application/octet-stream";
        if !plausible {
            if ct.starts_with("text/html") {
                if let Some(indicator) = geo_block_indicator(None, &response.final_url) {
                    return Err(ScraperError::GeoBlocked {
                        url: response.final_url,
                        indicator,
                    });
                }
            }
            return Err(ScraperError::NotAnImage {
                url,
                content_type,
            });
        }

        let hash = format!("{:x}", Sha256::digest(&response.body));
        let decoder = Arc::clone(&self.decoder);
        let body = response.body;
        let ct = content_type.clone();
        let metadata = tokio::task::spawn_blocking(move || decoder.decode(&body, ct.as_deref()))
            .await
            .map_err(|e| ScraperError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?
            .map_err(|e| ScraperError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        result.image = Some(metadata);
        result.content_hash = Some(hash);
        Ok(())
    }

    async fn fetch_image(&self, url: &str) -> Result<HttpResponse, ScraperError> {
        let request = HttpRequest::get(url, self.timeout).header("accept", IMAGE_ACCEPT);
        let response = self.http.fetch(&request).await?;
        if !response.is_success() {
            return Err(ScraperError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}
