//! Normalized string similarity used to decide whether a domain, page
//! title or alt text refers to the brand.

use crate::origin::domain_label;

/// When one normalized string contains the other, similarity is lifted to
/// at least `CONTAINMENT_FLOOR + (1 - CONTAINMENT_FLOOR) * edit_similarity`.
const CONTAINMENT_FLOOR: f64 = 0.8;
/// Containment of very short strings ("ac" in "acme") is not evidence.
const MIN_CONTAINED_LEN: usize = 3;

/// Lowercases and keeps alphanumeric characters only.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Classic edit distance over Unicode scalar values.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];
    for (i, ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Similarity in `[0, 1]` between two free-text strings.
///
/// Symmetric, and `1.0` for strings that normalize identically. A string
/// that normalizes to nothing matches nothing else.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let edit = 1.0 - levenshtein(&a, &b) as f64 / max_len as f64;

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let contained = shorter.chars().count() >= MIN_CONTAINED_LEN && longer.contains(shorter.as_str());
    let score = if contained {
        edit.max(CONTAINMENT_FLOOR + (1.0 - CONTAINMENT_FLOOR) * edit)
    } else {
        edit
    };
    score.clamp(0.0, 1.0)
}

/// Similarity between a brand name and the brand-bearing label of a host.
#[must_use]
pub fn domain_similarity(brand_name: &str, host: &str) -> f64 {
    similarity(brand_name, &domain_label(host))
}

/// Best similarity of `brand_name` against any of `evidence`.
#[must_use]
pub fn best_similarity<'a>(brand_name: &str, evidence: impl IntoIterator<Item = &'a str>) -> f64 {
    evidence
        .into_iter()
        .map(|text| similarity(brand_name, text))
        .fold(0.0, f64::max)
}
