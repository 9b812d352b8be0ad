//! Domain types shared by the resolver, the progress store and the publisher.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A brand to resolve. Built once from configuration and never mutated
/// during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandEntity {
    /// Stable slug; the key for every persisted record.
    pub id: String,
    pub display_name: String,
    /// Seed URL from configuration. May be stale, redirected, or geo-blocked.
    pub known_url: Option<String>,
    /// Uppercase ISO 3166-1 alpha-2 codes where the brand does not operate.
    pub restricted_regions: BTreeSet<String>,
}

/// Where a candidate came from. Declaration order is adapter precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    CuratedLogoApi,
    DirectSite,
    SearchDiscovery,
    FaviconFallback,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [
        SourceType::CuratedLogoApi,
        SourceType::DirectSite,
        SourceType::SearchDiscovery,
        SourceType::FaviconFallback,
    ];

    /// Precedence rank; 1 is the most trusted source.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            SourceType::CuratedLogoApi => 1,
            SourceType::DirectSite => 2,
            SourceType::SearchDiscovery => 3,
            SourceType::FaviconFallback => 4,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::CuratedLogoApi => "curated_logo_api",
            SourceType::DirectSite => "direct_site",
            SourceType::SearchDiscovery => "search_discovery",
            SourceType::FaviconFallback => "favicon_fallback",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a candidate points at. One variant per source type so each
/// adapter receives exactly the input it understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CandidateTarget {
    /// A page or asset URL on the brand's own site.
    DirectSite { url: String },
    /// Registrable domain to look up with the curated logo provider.
    CuratedLogoApi { domain: String },
    /// Free-text query seed for web search.
    SearchDiscovery { query: String },
    /// Origin (`scheme://host`) whose well-known icon paths are tried.
    FaviconFallback { origin: String },
}

/// An unverified proposal produced by the candidate generator.
///
/// Candidates are ephemeral: created per run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub brand_id: String,
    pub target: CandidateTarget,
    pub discovery_rank: Option<u32>,
    pub context_text: Option<String>,
}

impl Candidate {
    fn new(brand_id: &str, target: CandidateTarget) -> Self {
        Self {
            brand_id: brand_id.to_string(),
            target,
            discovery_rank: None,
            context_text: None,
        }
    }

    #[must_use]
    pub fn direct_site(brand_id: &str, url: impl Into<String>) -> Self {
        Self::new(brand_id, CandidateTarget::DirectSite { url: url.into() })
    }

    #[must_use]
    pub fn curated_logo_api(brand_id: &str, domain: impl Into<String>) -> Self {
        Self::new(
            brand_id,
            CandidateTarget::CuratedLogoApi {
                domain: domain.into(),
            },
        )
    }

    #[must_use]
    pub fn search_discovery(brand_id: &str, query: impl Into<String>) -> Self {
        Self::new(
            brand_id,
            CandidateTarget::SearchDiscovery {
                query: query.into(),
            },
        )
    }

    #[must_use]
    pub fn favicon_fallback(brand_id: &str, origin: impl Into<String>) -> Self {
        Self::new(
            brand_id,
            CandidateTarget::FaviconFallback {
                origin: origin.into(),
            },
        )
    }

    #[must_use]
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.discovery_rank = Some(rank);
        self
    }

    #[must_use]
    pub fn with_context(mut self, text: impl Into<String>) -> Self {
        self.context_text = Some(text.into());
        self
    }

    #[must_use]
    pub fn source_type(&self) -> SourceType {
        match self.target {
            CandidateTarget::DirectSite { .. } => SourceType::DirectSite,
            CandidateTarget::CuratedLogoApi { .. } => SourceType::CuratedLogoApi,
            CandidateTarget::SearchDiscovery { .. } => SourceType::SearchDiscovery,
            CandidateTarget::FaviconFallback { .. } => SourceType::FaviconFallback,
        }
    }

    /// The raw target string: a URL, a domain, a query, or an origin.
    #[must_use]
    pub fn url(&self) -> &str {
        match &self.target {
            CandidateTarget::DirectSite { url } => url,
            CandidateTarget::CuratedLogoApi { domain } => domain,
            CandidateTarget::SearchDiscovery { query } => query,
            CandidateTarget::FaviconFallback { origin } => origin,
        }
    }
}

/// A concrete image URL produced by a source adapter, together with the
/// context it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub brand_id: String,
    pub source_type: SourceType,
    pub url: String,
    pub discovery_rank: Option<u32>,
    /// Alt text, title or class markers of the element the URL came from.
    pub context_text: Option<String>,
    /// URL of the page the asset was found on.
    pub page_url: Option<String>,
    /// `<title>` of that page.
    pub page_title: Option<String>,
    /// HTTP status of the page request, when there was one.
    pub page_status: Option<u16>,
    /// Final page URL when the page request was redirected.
    pub redirect_target: Option<String>,
}

impl AssetRef {
    /// The URL whose domain says who published this asset: the redirect
    /// target, else the page, else the asset itself.
    #[must_use]
    pub fn evidence_url(&self) -> &str {
        self.redirect_target
            .as_deref()
            .or(self.page_url.as_deref())
            .unwrap_or(&self.url)
    }

    #[must_use]
    pub fn new(brand_id: &str, source_type: SourceType, url: impl Into<String>) -> Self {
        Self {
            brand_id: brand_id.to_string(),
            source_type,
            url: url.into(),
            discovery_rank: None,
            context_text: None,
            page_url: None,
            page_title: None,
            page_status: None,
            redirect_target: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Ico,
    Bmp,
    Svg,
    Other,
}

impl ImageFormat {
    #[must_use]
    pub fn is_vector(self) -> bool {
        matches!(self, ImageFormat::Svg)
    }
}

/// Objective facts about a decoded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub format: ImageFormat,
    /// Standard deviation of each decoded color channel (R, G, B, A).
    /// Empty for vector formats, which are not rasterized.
    pub channel_stddev: Vec<f64>,
}

impl ImageMetadata {
    #[must_use]
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Sum of per-channel standard deviations.
    #[must_use]
    pub fn color_variation(&self) -> f64 {
        self.channel_stddev.iter().sum()
    }
}

/// Why a candidate produced no usable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    HttpStatus,
    NotAnImage,
    Decode,
    GeoBlocked,
    Rejected,
}

/// Outcome of fetching and decoding one asset reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub asset: AssetRef,
    pub accessible: bool,
    pub http_status: Option<u16>,
    pub final_url: Option<String>,
    pub image: Option<ImageMetadata>,
    /// Hex SHA-256 of the response body.
    pub content_hash: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

/// A heuristic that contributed to a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityReason {
    GoodDimensions,
    HighResolution,
    GoodFileSize,
    DetailedContent,
    PngTransparency,
    VectorScalable,
    ColorRich,
    LikelyPlaceholder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Always within `0..=100`.
    pub value: u8,
    /// Triggered heuristics in evaluation order.
    pub reasons: Vec<QualityReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchScore {
    /// Within `[0, 1]`.
    pub fuzzy_similarity: f64,
    /// Within `[0, 1]`.
    pub source_reliability_weight: f64,
    /// Within `[0, 100]`.
    pub combined_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeAsset {
    pub url: String,
    pub confidence: f64,
    pub source_type: SourceType,
}

/// The best-known asset for a brand. Persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMapping {
    #[serde(rename = "slug")]
    pub brand_id: String,
    pub chosen_url: String,
    pub confidence: f64,
    pub source_type: SourceType,
    /// Sorted by descending confidence; never contains `chosen_url`.
    pub alternatives: Vec<AlternativeAsset>,
    pub resolved_at: DateTime<Utc>,
    /// Starts at 1 and increments on every improving overwrite.
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl ProgressStatus {
    /// Forward-only transitions. `InProgress -> InProgress` covers a retry
    /// after a crash. `Failed -> Pending` and `Done -> Pending` are only
    /// taken by an explicit reset or refresh.
    #[must_use]
    pub fn can_transition_to(self, next: ProgressStatus) -> bool {
        matches!(
            (self, next),
            (ProgressStatus::Pending | ProgressStatus::InProgress, ProgressStatus::InProgress)
                | (
                    ProgressStatus::InProgress,
                    ProgressStatus::Done | ProgressStatus::Failed
                )
                | (
                    ProgressStatus::Failed | ProgressStatus::Done,
                    ProgressStatus::Pending
                )
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Pending => "pending",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Done => "done",
            ProgressStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-brand checkpoint record. Persisted, one per brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    #[serde(rename = "slug")]
    pub brand_id: String,
    pub status: ProgressStatus,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
}

impl ProgressEntry {
    #[must_use]
    pub fn pending(brand_id: &str) -> Self {
        Self {
            brand_id: brand_id.to_string(),
            status: ProgressStatus::Pending,
            last_attempt_at: None,
            attempt_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_constructors_tag_source_type() {
        assert_eq!(
            Candidate::direct_site("acme", "https://acme.com/logo.png").source_type(),
            SourceType::DirectSite
        );
        assert_eq!(
            Candidate::curated_logo_api("acme", "acme.com").source_type(),
            SourceType::CuratedLogoApi
        );
        assert_eq!(
            Candidate::search_discovery("acme", "Acme Casino").source_type(),
            SourceType::SearchDiscovery
        );
        assert_eq!(
            Candidate::favicon_fallback("acme", "https://acme.com").source_type(),
            SourceType::FaviconFallback
        );
    }

    #[test]
    fn candidate_builder_sets_rank_and_context() {
        let c = Candidate::direct_site("acme", "https://acme.com")
            .with_rank(2)
            .with_context("Acme Casino - Official");
        assert_eq!(c.discovery_rank, Some(2));
        assert_eq!(c.context_text.as_deref(), Some("Acme Casino - Official"));
        assert_eq!(c.url(), "https://acme.com");
    }

    #[test]
    fn source_priority_follows_declaration_order() {
        let priorities: Vec<u8> = SourceType::ALL.iter().map(|s| s.priority()).collect();
        assert_eq!(priorities, vec![1, 2, 3, 4]);
        assert!(SourceType::CuratedLogoApi < SourceType::FaviconFallback);
    }

    #[test]
    fn status_transitions_are_forward_only() {
        use ProgressStatus::{Done, Failed, InProgress, Pending};
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Done));
        assert!(InProgress.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Pending));
        assert!(Done.can_transition_to(Pending));

        assert!(!Done.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(InProgress));
        assert!(!Pending.can_transition_to(Done));
        assert!(!InProgress.can_transition_to(Pending));
    }

    #[test]
    fn mapping_serializes_with_slug_key() {
        let mapping = ResolvedMapping {
            brand_id: "acme".to_string(),
            chosen_url: "https://acme.com/logo.png".to_string(),
            confidence: 86.7,
            source_type: SourceType::DirectSite,
            alternatives: vec![],
            resolved_at: Utc::now(),
            revision: 1,
            content_hash: None,
        };
        let json = serde_json::to_value(&mapping).unwrap();
        assert_eq!(json["slug"], "acme");
        assert_eq!(json["source_type"], "direct_site");
        assert!(json.get("content_hash").is_none());
    }

    #[test]
    fn color_variation_sums_channels() {
        let meta = ImageMetadata {
            width: 10,
            height: 10,
            byte_size: 100,
            format: ImageFormat::Png,
            channel_stddev: vec![10.0, 12.5, 7.5, 0.0],
        };
        assert!((meta.color_variation() - 30.0).abs() < f64::EPSILON);
        assert_eq!(meta.max_dimension(), 10);
    }
}
