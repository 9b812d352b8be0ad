use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use brandres_core::{BrandEntity, Candidate, CandidateTarget, SourceType};
use regex::Regex;
use reqwest::Url;

use super::{wrong_target, AdapterOutput, DomainLead, SourceAdapter};
use crate::error::ScraperError;
use crate::fuzzy::{domain_similarity, normalize, similarity};
use crate::geo::request_profile;
use crate::http::{HttpFetch, HttpRequest};
use crate::origin::{extract_host, extract_origin, registrable_domain};

static RESULT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b([^>]*\bclass\s*=\s*["'][^"']*\bresult__a\b[^"']*["'][^>]*)>(.*?)</a>"#)
        .expect("valid regex")
});
static RESULT_SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*\bclass\s*=\s*["'][^"']*\bresult__snippet\b[^"']*["'][^>]*>(.*?)</a>"#)
        .expect("valid regex")
});
static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\bhref\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid regex"));

/// Hosts that are never a brand's own site.
const IGNORED_HOSTS: &[&str] = &[
    "duckduckgo.com",
    "google.com",
    "bing.com",
    "youtube.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "reddit.com",
    "wikipedia.org",
    "trustpilot.com",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Organic results for `query`, in ranking order.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] when the search backend is unreachable or
    /// answers with a non-2xx status.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ScraperError>;
}

/// [`SearchProvider`] over DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoSearch {
    http: Arc<dyn HttpFetch>,
    base_url: String,
    timeout: Duration,
}

impl DuckDuckGoSearch {
    #[must_use]
    pub fn new(http: Arc<dyn HttpFetch>, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ScraperError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| ScraperError::InvalidUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        url.query_pairs_mut().append_pair("q", query);

        let mut request = HttpRequest::get(url.as_str(), self.timeout).header("accept", "text/html");
        request
            .headers
            .extend(request_profile(&std::collections::BTreeSet::new()).headers());
        let response = self.http.fetch(&request).await?;
        if !response.is_success() {
            return Err(ScraperError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }
        Ok(parse_results(&response.text()))
    }
}

/// Parses result links and snippets out of a DuckDuckGo HTML page.
#[must_use]
pub fn parse_results(html: &str) -> Vec<SearchHit> {
    let snippets: Vec<String> = RESULT_SNIPPET_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| strip_tags(m.as_str())))
        .collect();

    RESULT_LINK_RE
        .captures_iter(html)
        .enumerate()
        .filter_map(|(i, caps)| {
            let attrs = caps.get(1)?.as_str();
            let href = HREF_RE.captures(attrs)?.get(1)?.as_str();
            let url = decode_result_href(href)?;
            let title = strip_tags(caps.get(2)?.as_str());
            Some(SearchHit {
                url,
                title,
                snippet: snippets.get(i).cloned().unwrap_or_default(),
            })
        })
        .collect()
}

/// Unwraps DuckDuckGo's `/l/?uddg=` redirect links.
fn decode_result_href(href: &str) -> Option<String> {
    let href = href.replace("&amp;", "&");
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href
    };
    let parsed = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

fn strip_tags(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, "");
    text.replace("&amp;", "&")
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_ignored_host(host: &str) -> bool {
    IGNORED_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
}

/// Turns search results into brand-looking domains for the direct-site
/// adapter to expand. Produces no assets itself.
pub struct SearchDiscoveryAdapter {
    provider: Arc<dyn SearchProvider>,
    fuzzy_threshold: f64,
    results_per_query: usize,
}

impl SearchDiscoveryAdapter {
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>, fuzzy_threshold: f64, results_per_query: usize) -> Self {
        Self {
            provider,
            fuzzy_threshold,
            results_per_query: results_per_query.max(1),
        }
    }

    fn queries(seed: &str) -> Vec<String> {
        let seed = seed.trim();
        let first = if normalize(seed).contains("casino") {
            seed.to_string()
        } else {
            format!("{seed} online casino")
        };
        vec![first, format!("{seed} official site")]
    }
}

#[async_trait]
impl SourceAdapter for SearchDiscoveryAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::SearchDiscovery
    }

    async fn discover(
        &self,
        brand: &BrandEntity,
        candidate: &Candidate,
    ) -> Result<AdapterOutput, ScraperError> {
        let CandidateTarget::SearchDiscovery { query } = &candidate.target else {
            return Err(wrong_target(SourceType::SearchDiscovery, candidate));
        };

        let mut seen_domains = HashSet::new();
        let mut leads = Vec::new();
        let mut rank = 0u32;

        for q in Self::queries(query) {
            let hits = match self.provider.search(&q).await {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(brand = %brand.id, query = %q, error = %e, "search query failed");
                    continue;
                }
            };

            let usable = hits.into_iter().filter_map(|hit| {
                let host = extract_host(&hit.url)?;
                (!is_ignored_host(&host)).then_some((host, hit))
            });
            for (host, hit) in usable.take(self.results_per_query) {
                rank += 1;
                let domain = registrable_domain(&host);
                if !seen_domains.insert(domain.clone()) {
                    continue;
                }
                let score = domain_similarity(&brand.display_name, &host)
                    .max(similarity(&brand.display_name, &hit.title));
                if score < self.fuzzy_threshold {
                    tracing::debug!(
                        brand = %brand.id,
                        domain = %domain,
                        score,
                        "search result does not match brand"
                    );
                    continue;
                }
                let Some(origin) = extract_origin(&hit.url) else {
                    continue;
                };
                leads.push(DomainLead {
                    domain,
                    url: origin,
                    title: (!hit.title.is_empty()).then_some(hit.title),
                    rank,
                    similarity: score,
                });
            }
        }

        Ok(AdapterOutput {
            assets: Vec::new(),
            leads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{brand, StubFetcher, StubSearch};

    const DDG_PAGE: &str = r#"
        <div class="result">
          <h2 class="result__title">
            <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.acme%2Dcasino.example%2Fen%2F&amp;rut=abc">Acme <b>Casino</b> &amp; Sports</a>
          </h2>
          <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Play at <b>Acme</b> today</a>
        </div>
        <div class="result">
          <a rel="nofollow" class="result__a" href="https://www.youtube.com/watch?v=1">Acme review</a>
          <a class="result__snippet" href="x">Video</a>
        </div>
    "#;

    #[test]
    fn parses_and_unwraps_result_links() {
        let hits = parse_results(DDG_PAGE);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://www.acme-casino.example/en/");
        assert_eq!(hits[0].title, "Acme Casino & Sports");
        assert_eq!(hits[0].snippet, "Play at Acme today");
        assert_eq!(hits[1].url, "https://www.youtube.com/watch?v=1");
    }

    #[test]
    fn queries_avoid_doubling_casino() {
        assert_eq!(
            SearchDiscoveryAdapter::queries("Acme Casino"),
            vec!["Acme Casino".to_string(), "Acme Casino official site".to_string()]
        );
        assert_eq!(
            SearchDiscoveryAdapter::queries("Spellwin")[0],
            "Spellwin online casino"
        );
    }

    #[tokio::test]
    async fn duckduckgo_provider_fetches_and_parses() {
        let http = StubFetcher::new().html("https://ddg.test/html/?q=Acme+Casino", DDG_PAGE);
        let provider = DuckDuckGoSearch::new(Arc::new(http), "https://ddg.test/html/", Duration::from_secs(5));
        let hits = provider.search("Acme Casino").await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn leads_are_filtered_ranked_and_deduplicated() {
        let search = StubSearch::default()
            .with(
                "Acme Casino",
                &[
                    ("https://www.facebook.com/acmecasino", "Acme Casino | Facebook"),
                    ("https://acme-casino.example/", "Acme Casino"),
                    ("https://zebra-bingo.example/", "Zebra Bingo"),
                ],
            )
            .with(
                "Acme Casino official site",
                &[
                    ("https://acme-casino.example/promo", "Acme Casino promotions"),
                    ("https://acmecasino-ca.example/", "Welcome"),
                ],
            );
        let adapter = SearchDiscoveryAdapter::new(Arc::new(search), 0.7, 3);
        let acme = brand("acme", "Acme Casino", None);
        let out = adapter
            .discover(&acme, &Candidate::search_discovery("acme", "Acme Casino"))
            .await
            .unwrap();
        assert!(out.assets.is_empty());
        let got: Vec<(&str, u32)> = out.leads.iter().map(|l| (l.url.as_str(), l.rank)).collect();
        assert_eq!(
            got,
            vec![
                ("https://acme-casino.example", 1),
                ("https://acmecasino-ca.example", 4),
            ]
        );
    }
}
