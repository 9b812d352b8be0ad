//! Source adapters: one per [`SourceType`], each turning a candidate into
//! concrete asset URLs (or, for search, into domains worth expanding).

mod curated;
mod direct;
mod favicon;
mod search;

use async_trait::async_trait;
use brandres_core::{BrandEntity, Candidate, SourceType};

use crate::error::ScraperError;

pub use curated::CuratedLogoApiAdapter;
pub use direct::DirectSiteAdapter;
pub use favicon::FaviconFallbackAdapter;
pub use search::{DuckDuckGoSearch, SearchDiscoveryAdapter, SearchHit, SearchProvider};

/// A domain surfaced by web search that looks like it belongs to the brand.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainLead {
    /// Registrable domain, e.g. `acme-casino.example`.
    pub domain: String,
    /// Page to expand for logo images.
    pub url: String,
    pub title: Option<String>,
    /// 1-based position across all search results for the brand.
    pub rank: u32,
    pub similarity: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterOutput {
    pub assets: Vec<brandres_core::AssetRef>,
    pub leads: Vec<DomainLead>,
}

impl AdapterOutput {
    #[must_use]
    pub fn assets(assets: Vec<brandres_core::AssetRef>) -> Self {
        Self {
            assets,
            leads: Vec::new(),
        }
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_type(&self) -> SourceType;

    /// Turns one candidate into asset references.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] when the source cannot be reached or
    /// refuses the request. Callers treat that as "no assets".
    async fn discover(
        &self,
        brand: &BrandEntity,
        candidate: &Candidate,
    ) -> Result<AdapterOutput, ScraperError>;
}

/// The error returned when a candidate reaches the wrong adapter.
pub(crate) fn wrong_target(adapter: SourceType, candidate: &Candidate) -> ScraperError {
    ScraperError::InvalidUrl {
        url: candidate.url().to_string(),
        reason: format!(
            "{} candidate passed to {adapter} adapter",
            candidate.source_type()
        ),
    }
}
