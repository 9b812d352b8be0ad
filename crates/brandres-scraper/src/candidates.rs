//! Expands a brand into the ordered, deduplicated list of candidates the
//! source adapters will try.

use std::collections::HashSet;

use brandres_core::{BrandEntity, Candidate, EngineTuning, SourceType};

use crate::origin::{extract_host, extract_origin, normalize_url_key, registrable_domain};

/// Asset paths tried on the brand's own origin.
const ASSET_PATHS: &[&str] = &[
    "/logo.png",
    "/logo.svg",
    "/assets/logo.png",
    "/images/logo.png",
];

/// Subdomains that commonly host static assets.
const CDN_PREFIXES: &[&str] = &["cdn", "static", "assets"];

/// TLDs tried for domains guessed from the brand name.
const GUESSED_TLDS: &[&str] = &["com", "net", "io", "bet", "casino"];

/// Lowercase alphanumeric form of a brand name, used for guessed domains.
#[must_use]
pub fn brand_token(display_name: &str) -> String {
    display_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Lowercase words of a brand name, for matching alt text and file names.
#[must_use]
pub fn brand_words(display_name: &str) -> Vec<String> {
    let mut words: Vec<String> = display_name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    let joined = brand_token(display_name);
    if words.len() > 1 && !joined.is_empty() {
        words.push(joined);
    }
    words
}

/// Generates candidates for `brand`, ordered by source precedence and
/// capped at `tuning.max_candidates`.
///
/// The cap trims guessed direct-site URLs first; the curated, search and
/// favicon candidates are always kept. No two candidates of the same
/// source share a normalized target.
#[must_use]
pub fn generate_candidates(brand: &BrandEntity, tuning: &EngineTuning) -> Vec<Candidate> {
    let id = brand.id.as_str();
    let token = brand_token(&brand.display_name);
    let known_origin = brand.known_url.as_deref().and_then(extract_origin);
    let known_host = brand.known_url.as_deref().and_then(extract_host);
    let fallback_origin = (!token.is_empty()).then(|| format!("https://{token}.com"));

    let mut curated = Vec::new();
    if let Some(host) = known_host.as_deref() {
        curated.push(Candidate::curated_logo_api(id, registrable_domain(host)));
    } else if !token.is_empty() {
        curated.push(Candidate::curated_logo_api(id, format!("{token}.com")));
    }

    let mut direct = Vec::new();
    if let Some(known) = brand.known_url.as_deref() {
        direct.push(Candidate::direct_site(id, known));
    }
    if let Some(origin) = known_origin.as_deref() {
        for path in ASSET_PATHS {
            direct.push(Candidate::direct_site(id, format!("{origin}{path}")));
        }
    }
    if let Some(host) = known_host.as_deref() {
        let domain = registrable_domain(host);
        for prefix in CDN_PREFIXES {
            direct.push(Candidate::direct_site(
                id,
                format!("https://{prefix}.{domain}/logo.png"),
            ));
        }
    }
    if !token.is_empty() {
        for tld in GUESSED_TLDS {
            direct.push(
                Candidate::direct_site(id, format!("https://{token}.{tld}"))
                    .with_context(brand.display_name.clone()),
            );
        }
    }

    let search = vec![Candidate::search_discovery(id, brand.display_name.trim())];

    let favicon: Vec<Candidate> = known_origin
        .or(fallback_origin)
        .map(|origin| Candidate::favicon_fallback(id, origin))
        .into_iter()
        .collect();

    let reserved = curated.len() + search.len() + favicon.len();
    let direct_budget = tuning.max_candidates.saturating_sub(reserved);

    let mut seen = HashSet::new();
    let mut keep = |c: &Candidate| seen.insert(dedup_key(c));

    let mut out: Vec<Candidate> = Vec::new();
    out.extend(curated.into_iter().filter(|c| keep(c)));
    out.extend(direct.into_iter().filter(|c| keep(c)).take(direct_budget));
    out.extend(search.into_iter().filter(|c| keep(c)));
    out.extend(favicon.into_iter().filter(|c| keep(c)));
    out.truncate(tuning.max_candidates);

    debug_assert!(out
        .windows(2)
        .all(|w| w[0].source_type().priority() <= w[1].source_type().priority()));
    out
}

fn dedup_key(candidate: &Candidate) -> (SourceType, String) {
    let target = match candidate.source_type() {
        SourceType::DirectSite | SourceType::FaviconFallback => normalize_url_key(candidate.url()),
        SourceType::CuratedLogoApi | SourceType::SearchDiscovery => {
            candidate.url().trim().to_lowercase()
        }
    };
    (candidate.source_type(), target)
}
