//! Region-aware request profiles and detection of blocked or challenge pages.

use std::collections::BTreeSet;

use crate::http::BROWSER_FALLBACK_UA;

/// Regions tried in order when picking where a request should appear to
/// come from. The first one the brand does not restrict wins.
const PREFERRED_REGIONS: &[(&str, &str)] = &[
    ("CA", "en-CA,en;q=0.9"),
    ("AU", "en-AU,en;q=0.9"),
    ("NZ", "en-NZ,en;q=0.9"),
    ("FI", "fi-FI,fi;q=0.9,en;q=0.8"),
    ("NO", "nb-NO,nb;q=0.9,en;q=0.8"),
    ("SE", "sv-SE,sv;q=0.9,en;q=0.8"),
    ("DE", "de-DE,de;q=0.9,en;q=0.8"),
    ("AT", "de-AT,de;q=0.9,en;q=0.8"),
];

const TITLE_BLOCK_MARKERS: &[&str] = &[
    "blocked",
    "restricted",
    "not available in your",
    "access denied",
    "unavailable in your region",
];

const URL_BLOCK_MARKERS: &[&str] = &["blocked", "geo", "restricted", "country-not-allowed"];

/// Header set that makes a page request look like it comes from a region
/// where the brand is allowed to operate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProfile {
    pub region: &'static str,
    pub accept_language: &'static str,
    pub user_agent: &'static str,
}

impl RequestProfile {
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("user-agent".to_string(), self.user_agent.to_string()),
            (
                "accept-language".to_string(),
                self.accept_language.to_string(),
            ),
        ]
    }
}

/// Picks the first preferred region not in `restricted`, falling back to
/// Canada when the brand restricts all of them.
#[must_use]
pub fn request_profile(restricted: &BTreeSet<String>) -> RequestProfile {
    let (region, accept_language) = PREFERRED_REGIONS
        .iter()
        .find(|(code, _)| !restricted.contains(*code))
        .copied()
        .unwrap_or(PREFERRED_REGIONS[0]);
    RequestProfile {
        region,
        accept_language,
        user_agent: BROWSER_FALLBACK_UA,
    }
}

/// Returns the marker that identifies a geo-block page, if any.
///
/// Only the path and query of `final_url` are inspected so that a brand
/// whose domain happens to contain "geo" is not flagged.
#[must_use]
pub fn geo_block_indicator(title: Option<&str>, final_url: &str) -> Option<String> {
    if let Some(title) = title {
        let lowered = title.to_ascii_lowercase();
        if let Some(marker) = TITLE_BLOCK_MARKERS.iter().find(|m| lowered.contains(*m)) {
            return Some(format!("title:{marker}"));
        }
    }

    let tail = reqwest::Url::parse(final_url).map_or_else(
        |_| final_url.to_ascii_lowercase(),
        |u| {
            format!("{}?{}", u.path(), u.query().unwrap_or_default()).to_ascii_lowercase()
        },
    );
    URL_BLOCK_MARKERS
        .iter()
        .find(|m| tail.contains(*m))
        .map(|m| format!("url:{m}"))
}

/// Cloudflare-style interstitials that never contain the real page.
#[must_use]
pub fn looks_like_bot_challenge(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    let has_cloudflare_banner = lowered.contains("attention required! | cloudflare");
    let has_challenge_platform = lowered.contains("/cdn-cgi/challenge-platform/");
    let has_just_a_moment = lowered.contains("just a moment...");
    let has_cookie_gate = lowered.contains("please enable cookies");
    let has_cf_chl = lowered.contains("cf-chl-");

    has_cloudflare_banner
        || has_challenge_platform
        || (has_just_a_moment && has_cookie_gate)
        || (has_just_a_moment && has_cf_chl)
}
