//! Per-brand resolution pipeline: candidates, adapters, validation,
//! scoring and selection.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use brandres_core::{
    AppConfig, AssetRef, BrandEntity, Candidate, EngineTuning, ErrorKind, ResolvedMapping,
    SourceType, ValidationResult,
};
use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::adapters::{
    AdapterOutput, CuratedLogoApiAdapter, DirectSiteAdapter, DomainLead, DuckDuckGoSearch,
    FaviconFallbackAdapter, SearchDiscoveryAdapter, SearchProvider, SourceAdapter,
};
use crate::browser::HeadlessBrowser;
use crate::candidates::generate_candidates;
use crate::confidence::{match_score, select, ScoredCandidate};
use crate::decode::{ImageDecoder, StandardDecoder};
use crate::error::ScraperError;
use crate::fuzzy::{best_similarity, domain_similarity};
use crate::http::{HttpFetch, ReqwestFetcher, ThrottledFetcher};
use crate::origin::{extract_host, normalize_url_key, same_site};
use crate::quality::{assess, is_acceptable, shape_rejection};
use crate::validate::Validator;

/// Sources tried together, tier by tier. A later tier only runs when no
/// earlier tier produced an accepted candidate.
pub const STRATEGY: &[&[SourceType]] = &[
    &[
        SourceType::CuratedLogoApi,
        SourceType::DirectSite,
        SourceType::SearchDiscovery,
    ],
    &[SourceType::FaviconFallback],
];

/// Images kept per expanded page.
const MAX_IMAGES_PER_PAGE: usize = 6;

/// Network and provider settings for a [`Resolver`].
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub request_timeout: Duration,
    pub host_spacing: Duration,
    pub validation_workers: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub user_agent: String,
    pub logo_api_base_url: String,
    pub logo_api_token: Option<String>,
    pub logo_search_url: String,
    pub logo_search_key: Option<String>,
    pub search_base_url: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(12),
            host_spacing: Duration::from_millis(750),
            validation_workers: 4,
            max_retries: 2,
            retry_backoff: Duration::from_secs(1),
            user_agent: "brandres/0.1 (brand-asset-resolution)".to_string(),
            logo_api_base_url: "https://img.logo.dev".to_string(),
            logo_api_token: None,
            logo_search_url: "https://api.logo.dev/search".to_string(),
            logo_search_key: None,
            search_base_url: "https://html.duckduckgo.com/html/".to_string(),
        }
    }
}

impl From<&AppConfig> for ResolverSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            host_spacing: Duration::from_millis(config.host_spacing_ms),
            validation_workers: config.validation_workers,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            user_agent: config.user_agent.clone(),
            logo_api_base_url: config.logo_api_base_url.clone(),
            logo_api_token: config.logo_api_token.clone(),
            logo_search_url: config.logo_search_url.clone(),
            logo_search_key: config.logo_search_key.clone(),
            search_base_url: config.search_base_url.clone(),
        }
    }
}

/// Capabilities the resolver fetches, decodes, searches and renders through.
pub struct ResolverDeps {
    pub http: Arc<dyn HttpFetch>,
    pub decoder: Arc<dyn ImageDecoder>,
    /// `None` disables search discovery.
    pub search: Option<Arc<dyn SearchProvider>>,
    pub browser: Option<Arc<dyn HeadlessBrowser>>,
}

/// Counters for one brand's resolution, used in logs and the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub candidates: usize,
    pub assets_checked: usize,
    pub accepted: usize,
    pub geo_blocked: usize,
    pub tiers_run: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub brand_id: String,
    /// Best mapping found this attempt. `revision` is left at 0; the
    /// progress store assigns revisions when it merges.
    pub mapping: Option<ResolvedMapping>,
    pub stats: ResolutionStats,
    /// The run was cancelled while this brand was being resolved.
    pub cancelled: bool,
}

pub struct Resolver {
    adapters: BTreeMap<SourceType, Arc<dyn SourceAdapter>>,
    direct: Arc<DirectSiteAdapter>,
    validator: Validator,
    tuning: EngineTuning,
    cancel: CancellationToken,
}

impl Resolver {
    /// Wires adapters and the validator over `deps.http`, adding per-host
    /// spacing and cancellation in front of it.
    #[must_use]
    pub fn new(
        settings: &ResolverSettings,
        tuning: EngineTuning,
        deps: ResolverDeps,
        cancel: CancellationToken,
    ) -> Self {
        let http: Arc<dyn HttpFetch> = Arc::new(ThrottledFetcher::new(
            deps.http,
            settings.host_spacing,
            cancel.clone(),
        ));

        let direct = Arc::new(DirectSiteAdapter::new(
            Arc::clone(&http),
            deps.browser,
            settings.request_timeout,
            MAX_IMAGES_PER_PAGE,
        ));
        let curated = CuratedLogoApiAdapter::new(
            Arc::clone(&http),
            &settings.logo_api_base_url,
            settings.logo_api_token.clone(),
            &settings.logo_search_url,
            settings.logo_search_key.clone(),
            settings.request_timeout,
            tuning.fuzzy_threshold,
            tuning.search_results_per_query,
        );

        let mut adapters: BTreeMap<SourceType, Arc<dyn SourceAdapter>> = BTreeMap::new();
        adapters.insert(SourceType::CuratedLogoApi, Arc::new(curated));
        adapters.insert(SourceType::DirectSite, direct.clone());
        if let Some(provider) = deps.search {
            adapters.insert(
                SourceType::SearchDiscovery,
                Arc::new(SearchDiscoveryAdapter::new(
                    provider,
                    tuning.fuzzy_threshold,
                    tuning.search_results_per_query,
                )),
            );
        }
        adapters.insert(SourceType::FaviconFallback, Arc::new(FaviconFallbackAdapter));

        let validator = Validator::new(
            http,
            deps.decoder,
            settings.validation_workers,
            settings.request_timeout,
            settings.max_retries,
            settings.retry_backoff,
        );

        Self {
            adapters,
            direct,
            validator,
            tuning,
            cancel,
        }
    }

    /// Production wiring: reqwest, the standard decoder, DuckDuckGo search
    /// and no headless browser.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ClientBuild`] if the HTTP client cannot be built.
    pub fn with_default_deps(
        settings: &ResolverSettings,
        tuning: EngineTuning,
        cancel: CancellationToken,
    ) -> Result<Self, ScraperError> {
        let raw: Arc<dyn HttpFetch> = Arc::new(ReqwestFetcher::new(
            &settings.user_agent,
            settings.request_timeout,
        )?);
        // The provider is built outside the resolver, so it gets its own throttle.
        let search_http: Arc<dyn HttpFetch> = Arc::new(ThrottledFetcher::new(
            Arc::clone(&raw),
            settings.host_spacing,
            cancel.clone(),
        ));
        let search: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoSearch::new(
            search_http,
            &settings.search_base_url,
            settings.request_timeout,
        ));
        Ok(Self::new(
            settings,
            tuning,
            ResolverDeps {
                http: raw,
                decoder: Arc::new(StandardDecoder),
                search: Some(search),
                browser: None,
            },
            cancel,
        ))
    }

    /// Resolves one brand. Never fails: a brand with no acceptable asset
    /// yields a resolution without a mapping.
    pub async fn resolve(&self, brand: &BrandEntity) -> Resolution {
        let candidates = generate_candidates(brand, &self.tuning);
        let mut stats = ResolutionStats {
            candidates: candidates.len(),
            ..ResolutionStats::default()
        };
        let mut accepted: Vec<ScoredCandidate> = Vec::new();
        let mut seen_assets: HashSet<String> = HashSet::new();

        for tier in STRATEGY {
            if self.cancel.is_cancelled() {
                break;
            }
            stats.tiers_run += 1;

            let tier_candidates: Vec<&Candidate> = candidates
                .iter()
                .filter(|c| tier.contains(&c.source_type()))
                .collect();
            let outputs =
                join_all(tier_candidates.iter().map(|c| self.discover(brand, c))).await;

            let mut assets: Vec<AssetRef> = Vec::new();
            let mut leads: Vec<DomainLead> = Vec::new();
            for (output, geo_blocked) in outputs {
                assets.extend(output.assets);
                leads.extend(output.leads);
                stats.geo_blocked += usize::from(geo_blocked);
            }
            let (lead_assets, lead_geo_blocks) = self.expand_leads(brand, leads).await;
            assets.extend(lead_assets);
            stats.geo_blocked += lead_geo_blocks;

            assets.retain(|a| seen_assets.insert(normalize_url_key(&a.url)));
            stats.assets_checked += assets.len();

            let results = self.validator.validate_all(assets).await;
            for result in results {
                if result.error_kind == Some(ErrorKind::GeoBlocked) {
                    stats.geo_blocked += 1;
                }
                if let Some(scored) = self.evaluate(brand, result) {
                    accepted.push(scored);
                }
            }

            if !accepted.is_empty() {
                break;
            }
        }

        stats.accepted = accepted.len();
        let cancelled = self.cancel.is_cancelled();
        let mapping = select(accepted, self.tuning.max_alternatives).map(|selection| {
            let winner = selection.winner;
            ResolvedMapping {
                brand_id: brand.id.clone(),
                chosen_url: winner.url().to_string(),
                confidence: winner.confidence(),
                source_type: winner.source_type(),
                alternatives: selection.alternatives,
                resolved_at: Utc::now(),
                revision: 0,
                content_hash: winner.validation.content_hash.clone(),
            }
        });

        match &mapping {
            Some(m) => tracing::info!(
                brand = %brand.id,
                url = %m.chosen_url,
                source = %m.source_type,
                confidence = m.confidence,
                candidates = stats.candidates,
                assets = stats.assets_checked,
                accepted = stats.accepted,
                "brand resolved"
            ),
            None => tracing::warn!(
                brand = %brand.id,
                candidates = stats.candidates,
                assets = stats.assets_checked,
                geo_blocked = stats.geo_blocked,
                cancelled,
                "no acceptable asset for brand"
            ),
        }

        Resolution {
            brand_id: brand.id.clone(),
            mapping,
            stats,
            cancelled,
        }
    }

    /// Runs the candidate's adapter. Adapter failures are logged and
    /// treated as empty output; the flag reports a geo-block.
    async fn discover(
        &self,
        brand: &BrandEntity,
        candidate: &Candidate,
    ) -> (AdapterOutput, bool) {
        let Some(adapter) = self.adapters.get(&candidate.source_type()) else {
            return (AdapterOutput::default(), false);
        };
        match adapter.discover(brand, candidate).await {
            Ok(output) => (output, false),
            Err(err) => (AdapterOutput::default(), log_adapter_error(brand, candidate.url(), &err)),
        }
    }

    /// Expands search leads through the direct-site adapter and relabels
    /// what they yield as search discoveries.
    async fn expand_leads(
        &self,
        brand: &BrandEntity,
        leads: Vec<DomainLead>,
    ) -> (Vec<AssetRef>, usize) {
        let leads: Vec<DomainLead> = leads
            .into_iter()
            .filter(|lead| {
                !brand
                    .known_url
                    .as_deref()
                    .is_some_and(|known| same_site(known, &lead.url))
            })
            .collect();

        let expanded = join_all(leads.iter().map(|lead| async move {
            (lead, self.direct.expand_page(brand, &lead.url).await)
        }))
        .await;

        let mut assets = Vec::new();
        let mut geo_blocks = 0;
        for (lead, outcome) in expanded {
            match outcome {
                Ok(found) => assets.extend(found.into_iter().map(|mut asset| {
                    asset.source_type = SourceType::SearchDiscovery;
                    asset.discovery_rank = Some(lead.rank);
                    if asset.page_title.is_none() {
                        asset.page_title.clone_from(&lead.title);
                    }
                    asset
                })),
                Err(err) => {
                    geo_blocks += usize::from(log_adapter_error(brand, &lead.url, &err));
                }
            }
        }
        (assets, geo_blocks)
    }

    /// Applies shape, quality and match gates. Returns `None` for anything
    /// that cannot be a mapping.
    fn evaluate(&self, brand: &BrandEntity, result: ValidationResult) -> Option<ScoredCandidate> {
        if result.error_kind.is_some() {
            return None;
        }
        let image = result.image.as_ref()?;

        if let Some(reason) = shape_rejection(image) {
            tracing::debug!(brand = %brand.id, url = %result.asset.url, reason, "asset rejected");
            return None;
        }

        let quality = assess(image, &self.tuning);
        if !is_acceptable(&quality, &self.tuning) {
            tracing::debug!(
                brand = %brand.id,
                url = %result.asset.url,
                quality = quality.value,
                "asset below quality floor"
            );
            return None;
        }

        let asset = &result.asset;
        let evidence_url = asset.evidence_url();
        let domain_score = extract_host(evidence_url)
            .map_or(0.0, |host| domain_similarity(&brand.display_name, &host));
        let text_score = best_similarity(
            &brand.display_name,
            [asset.page_title.as_deref(), asset.context_text.as_deref()]
                .into_iter()
                .flatten(),
        );
        let fuzzy = domain_score.max(text_score);

        let configured_site = brand
            .known_url
            .as_deref()
            .is_some_and(|known| same_site(known, evidence_url));
        let gated = matches!(
            asset.source_type,
            SourceType::DirectSite | SourceType::SearchDiscovery
        );
        if gated && !configured_site && fuzzy < self.tuning.fuzzy_threshold {
            tracing::debug!(
                brand = %brand.id,
                url = %asset.url,
                evidence = evidence_url,
                fuzzy,
                "asset does not match brand"
            );
            return None;
        }

        let matching = match_score(&quality, asset.source_type, fuzzy, &self.tuning);
        Some(ScoredCandidate {
            validation: result,
            quality,
            matching,
        })
    }
}

/// Logs an adapter failure; returns `true` when it was a geo-block.
fn log_adapter_error(brand: &BrandEntity, url: &str, err: &ScraperError) -> bool {
    match err {
        ScraperError::GeoBlocked { .. } => {
            tracing::warn!(brand = %brand.id, url, geo_blocked = true, error = %err, "source geo-blocked");
            true
        }
        ScraperError::Cancelled { .. } => {
            tracing::debug!(brand = %brand.id, url, "source skipped after cancellation");
            false
        }
        _ => {
            tracing::warn!(brand = %brand.id, url, error = %err, "source failed");
            false
        }
    }
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod tests;
