use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brandres_core::{AssetRef, BrandEntity, Candidate, CandidateTarget, SourceType};
use reqwest::Url;
use serde::Deserialize;

use super::{wrong_target, AdapterOutput, SourceAdapter};
use crate::error::ScraperError;
use crate::fuzzy::{domain_similarity, similarity};
use crate::http::{HttpFetch, HttpRequest};
use crate::origin::registrable_domain;

/// Requested logo edge length in pixels.
const LOGO_SIZE: &str = "400";

/// One entry of the provider's brand-search response.
#[derive(Debug, Deserialize)]
struct LogoSearchHit {
    name: String,
    domain: String,
}

/// Builds logo URLs on a curated provider (logo.dev-compatible).
///
/// The primary asset is the provider's logo for the candidate domain. When
/// a search key is configured, the provider's brand search adds the logos
/// of other domains whose name matches the brand.
pub struct CuratedLogoApiAdapter {
    http: Arc<dyn HttpFetch>,
    base_url: String,
    token: Option<String>,
    search_url: String,
    search_key: Option<String>,
    timeout: Duration,
    fuzzy_threshold: f64,
    max_results: usize,
}

impl CuratedLogoApiAdapter {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: Arc<dyn HttpFetch>,
        base_url: &str,
        token: Option<String>,
        search_url: &str,
        search_key: Option<String>,
        timeout: Duration,
        fuzzy_threshold: f64,
        max_results: usize,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            search_url: search_url.to_string(),
            search_key,
            timeout,
            fuzzy_threshold,
            max_results,
        }
    }

    /// Provider URL for `domain`'s logo.
    ///
    /// Asks for a 404 instead of the provider's generated monogram when the
    /// domain is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] if the configured base URL and
    /// the domain do not form a valid URL.
    pub fn logo_url(&self, domain: &str) -> Result<String, ScraperError> {
        let raw = format!("{}/{}", self.base_url, domain.trim().to_ascii_lowercase());
        let mut url = Url::parse(&raw).map_err(|e| ScraperError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(token) = &self.token {
                query.append_pair("token", token);
            }
            query.append_pair("size", LOGO_SIZE);
            query.append_pair("format", "png");
            query.append_pair("fallback", "404");
        }
        Ok(url.to_string())
    }

    async fn search_domains(&self, brand: &BrandEntity) -> Result<Vec<LogoSearchHit>, ScraperError> {
        let Some(key) = &self.search_key else {
            return Ok(Vec::new());
        };
        let mut url = Url::parse(&self.search_url).map_err(|e| ScraperError::InvalidUrl {
            url: self.search_url.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("q", &brand.display_name);

        let request = HttpRequest::get(url.as_str(), self.timeout)
            .header("authorization", format!("Bearer {key}"))
            .header("accept", "application/json");
        let response = self.http.fetch(&request).await?;
        if !response.is_success() {
            return Err(ScraperError::HttpStatus {
                status: response.status,
                url: self.search_url.clone(),
            });
        }
        serde_json::from_slice::<Vec<LogoSearchHit>>(&response.body).map_err(|source| {
            ScraperError::Deserialize {
                context: format!("logo search for {}", brand.id),
                source,
            }
        })
    }
}

#[async_trait]
impl SourceAdapter for CuratedLogoApiAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::CuratedLogoApi
    }

    async fn discover(
        &self,
        brand: &BrandEntity,
        candidate: &Candidate,
    ) -> Result<AdapterOutput, ScraperError> {
        let CandidateTarget::CuratedLogoApi { domain } = &candidate.target else {
            return Err(wrong_target(SourceType::CuratedLogoApi, candidate));
        };
        let primary = registrable_domain(domain);

        let mut asset = AssetRef::new(&brand.id, SourceType::CuratedLogoApi, self.logo_url(&primary)?);
        asset.discovery_rank = Some(0);
        asset.context_text = Some(primary.clone());
        asset.page_url = Some(format!("https://{primary}"));
        let mut assets = vec![asset];

        let hits = match self.search_domains(brand).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(brand = %brand.id, error = %e, "logo provider search failed");
                Vec::new()
            }
        };

        let mut rank = 0u32;
        for hit in hits {
            if assets.len() > self.max_results {
                break;
            }
            let domain = registrable_domain(&hit.domain);
            if domain.is_empty() || assets.iter().any(|a| a.context_text.as_deref() == Some(domain.as_str())) {
                continue;
            }
            let score = similarity(&brand.display_name, &hit.name)
                .max(domain_similarity(&brand.display_name, &domain));
            if score < self.fuzzy_threshold {
                tracing::debug!(
                    brand = %brand.id,
                    domain = %domain,
                    score,
                    "logo provider hit does not match brand"
                );
                continue;
            }
            rank += 1;
            let mut extra = AssetRef::new(&brand.id, SourceType::CuratedLogoApi, self.logo_url(&domain)?);
            extra.discovery_rank = Some(rank);
            extra.context_text = Some(domain.clone());
            extra.page_url = Some(format!("https://{domain}"));
            extra.page_title = Some(hit.name);
            assets.push(extra);
        }

        Ok(AdapterOutput::assets(assets))
    }
}
