//! Empirical thresholds and weights used by the scoring stages.
//!
//! These are tuning knobs carried over from the hand-picked values the
//! resolver was calibrated with. Changing them shifts which candidates win;
//! it does not affect any invariant.

use crate::model::SourceType;

/// Minimum quality score a validated image needs to reach the combiner.
pub const DEFAULT_ACCEPTANCE_FLOOR: u8 = 30;
/// Minimum fuzzy similarity for a search-discovered domain to be expanded.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;
/// Summed per-channel standard deviation above which an image counts as
/// color-rich.
pub const DEFAULT_COLOR_STDDEV_THRESHOLD: f64 = 30.0;
pub const DEFAULT_MAX_ALTERNATIVES: usize = 5;
pub const DEFAULT_MAX_CANDIDATES: usize = 15;
pub const DEFAULT_SEARCH_RESULTS_PER_QUERY: usize = 3;
/// One past the lowest-precedence source priority; the combiner's
/// precedence bonus is `0.1 * (PRIORITY_CEILING - priority)`.
pub const PRIORITY_CEILING: u8 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineTuning {
    pub acceptance_floor: u8,
    pub fuzzy_threshold: f64,
    pub color_stddev_threshold: f64,
    pub max_alternatives: usize,
    pub max_candidates: usize,
    pub search_results_per_query: usize,
    pub curated_weight: f64,
    pub direct_weight: f64,
    pub search_weight: f64,
    pub favicon_weight: f64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        Self {
            acceptance_floor: DEFAULT_ACCEPTANCE_FLOOR,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            color_stddev_threshold: DEFAULT_COLOR_STDDEV_THRESHOLD,
            max_alternatives: DEFAULT_MAX_ALTERNATIVES,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            search_results_per_query: DEFAULT_SEARCH_RESULTS_PER_QUERY,
            curated_weight: 0.90,
            direct_weight: 0.85,
            search_weight: 0.70,
            favicon_weight: 0.40,
        }
    }
}

impl EngineTuning {
    /// Fixed reliability weight for a source, clamped to `[0, 1]`.
    #[must_use]
    pub fn reliability_weight(&self, source: SourceType) -> f64 {
        let w = match source {
            SourceType::CuratedLogoApi => self.curated_weight,
            SourceType::DirectSite => self.direct_weight,
            SourceType::SearchDiscovery => self.search_weight,
            SourceType::FaviconFallback => self.favicon_weight,
        };
        w.clamp(0.0, 1.0)
    }
}
