//! Turns scored candidates into one chosen asset plus ranked alternatives.

use std::cmp::Ordering;
use std::collections::HashSet;

use brandres_core::tuning::PRIORITY_CEILING;
use brandres_core::{
    AlternativeAsset, EngineTuning, MatchScore, QualityScore, SourceType, ValidationResult,
};

use crate::origin::normalize_url_key;

/// A validated asset that cleared the quality floor and the match gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub validation: ValidationResult,
    pub quality: QualityScore,
    pub matching: MatchScore,
}

impl ScoredCandidate {
    #[must_use]
    pub fn url(&self) -> &str {
        &self.validation.asset.url
    }

    #[must_use]
    pub fn source_type(&self) -> SourceType {
        self.validation.asset.source_type
    }

    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.matching.combined_confidence
    }
}

/// Winner and runners-up for one brand.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub winner: ScoredCandidate,
    pub alternatives: Vec<AlternativeAsset>,
}

/// `quality * weight * (1 + 0.1 * (PRIORITY_CEILING - priority))`, clamped
/// to `[0, 100]` and rounded to two decimals.
///
/// With the default weights every curated asset of quality 86 or more
/// saturates at 100; [`rank`] then orders those by quality.
#[must_use]
pub fn combined_confidence(quality: u8, source: SourceType, tuning: &EngineTuning) -> f64 {
    let weight = tuning.reliability_weight(source);
    let bonus = 1.0 + 0.1 * f64::from(PRIORITY_CEILING.saturating_sub(source.priority()));
    let raw = (f64::from(quality) * weight * bonus).clamp(0.0, 100.0);
    (raw * 100.0).round() / 100.0
}

/// Builds the match score for an accepted asset.
#[must_use]
pub fn match_score(
    quality: &QualityScore,
    source: SourceType,
    fuzzy_similarity: f64,
    tuning: &EngineTuning,
) -> MatchScore {
    MatchScore {
        fuzzy_similarity: fuzzy_similarity.clamp(0.0, 1.0),
        source_reliability_weight: tuning.reliability_weight(source),
        combined_confidence: combined_confidence(quality.value, source, tuning),
    }
}

/// Total order, best first: confidence, then quality, then source
/// precedence, then discovery rank (unranked last), then URL.
#[must_use]
pub fn rank(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.confidence()
        .total_cmp(&a.confidence())
        .then_with(|| b.quality.value.cmp(&a.quality.value))
        .then_with(|| a.source_type().priority().cmp(&b.source_type().priority()))
        .then_with(|| {
            match (
                a.validation.asset.discovery_rank,
                b.validation.asset.discovery_rank,
            ) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        })
        .then_with(|| a.url().cmp(b.url()))
}

/// Picks the best candidate. Returns `None` for an empty input.
///
/// Alternatives never repeat the winner's URL or content, never repeat
/// each other, and are capped at `max_alternatives`.
#[must_use]
pub fn select(mut candidates: Vec<ScoredCandidate>, max_alternatives: usize) -> Option<Selection> {
    candidates.sort_by(rank);
    let mut iter = candidates.into_iter();
    let winner = iter.next()?;

    let mut seen_urls = HashSet::from([normalize_url_key(winner.url())]);
    let mut seen_hashes: HashSet<String> = winner.validation.content_hash.iter().cloned().collect();

    let mut alternatives = Vec::new();
    for candidate in iter {
        if alternatives.len() >= max_alternatives {
            break;
        }
        if !seen_urls.insert(normalize_url_key(candidate.url())) {
            continue;
        }
        if let Some(hash) = &candidate.validation.content_hash {
            if !seen_hashes.insert(hash.clone()) {
                continue;
            }
        }
        alternatives.push(AlternativeAsset {
            url: candidate.url().to_string(),
            confidence: candidate.confidence(),
            source_type: candidate.source_type(),
        });
    }

    Some(Selection {
        winner,
        alternatives,
    })
}
