use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brandres_core::{AssetRef, BrandEntity, Candidate, CandidateTarget, SourceType};

use super::{wrong_target, AdapterOutput, SourceAdapter};
use crate::browser::HeadlessBrowser;
use crate::candidates::brand_words;
use crate::error::ScraperError;
use crate::geo::{geo_block_indicator, looks_like_bot_challenge, request_profile, RequestProfile};
use crate::html::{classify_elements, extract_logo_images, extract_title, PageImage};
use crate::http::{HttpFetch, HttpRequest};
use crate::origin::{looks_like_image_path, normalize_url_key};

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml";

/// Reads the brand's own site.
///
/// Image-looking URLs become asset references directly and are left to the
/// validator. Page URLs are fetched with a region profile the brand is
/// allowed in, checked for geo-blocks and bot challenges, and scanned for
/// logo-like images. A configured [`HeadlessBrowser`] takes over when the
/// static HTML is a challenge or has no logo.
pub struct DirectSiteAdapter {
    http: Arc<dyn HttpFetch>,
    browser: Option<Arc<dyn HeadlessBrowser>>,
    timeout: Duration,
    max_images_per_page: usize,
}

/// Page-level context shared by every image found on one page.
struct PageContext {
    requested_url: String,
    final_url: String,
    status: Option<u16>,
    title: Option<String>,
}

impl DirectSiteAdapter {
    #[must_use]
    pub fn new(
        http: Arc<dyn HttpFetch>,
        browser: Option<Arc<dyn HeadlessBrowser>>,
        timeout: Duration,
        max_images_per_page: usize,
    ) -> Self {
        Self {
            http,
            browser,
            timeout,
            max_images_per_page: max_images_per_page.max(1),
        }
    }

    /// Fetches `url` as a page and returns the logo-like images on it,
    /// best first.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::GeoBlocked`] when the page is a region
    /// block, [`ScraperError::HttpStatus`] for non-2xx responses, and
    /// [`ScraperError::Rejected`] for a bot challenge no browser could pass.
    pub async fn expand_page(
        &self,
        brand: &BrandEntity,
        url: &str,
    ) -> Result<Vec<AssetRef>, ScraperError> {
        let profile = request_profile(&brand.restricted_regions);
        let tokens = brand_words(&brand.display_name);

        let mut request = HttpRequest::get(url, self.timeout).header("accept", HTML_ACCEPT);
        request.headers.extend(profile.headers());
        let response = self.http.fetch(&request).await?;

        if !response.is_success() {
            if response.status == 403 && self.browser.is_some() {
                return self.render(brand, url, &profile, &tokens).await;
            }
            return Err(ScraperError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        let body = response.text();
        let title = extract_title(&body);
        if let Some(indicator) = geo_block_indicator(title.as_deref(), &response.final_url) {
            return Err(ScraperError::GeoBlocked {
                url: response.final_url,
                indicator,
            });
        }

        if looks_like_bot_challenge(&body) {
            if self.browser.is_some() {
                return self.render(brand, url, &profile, &tokens).await;
            }
            return Err(ScraperError::Rejected {
                url: url.to_string(),
                reason: "bot challenge page".to_string(),
            });
        }

        let images = extract_logo_images(
            &response.final_url,
            &body,
            &tokens,
            self.max_images_per_page,
        );
        if images.is_empty() && self.browser.is_some() {
            tracing::debug!(
                brand = %brand.id,
                url,
                "no logo in static HTML, rendering page"
            );
            return self.render(brand, url, &profile, &tokens).await;
        }

        let page = PageContext {
            requested_url: url.to_string(),
            final_url: response.final_url,
            status: Some(response.status),
            title,
        };
        Ok(to_assets(brand, &page, images))
    }

    async fn render(
        &self,
        brand: &BrandEntity,
        url: &str,
        profile: &RequestProfile,
        tokens: &[String],
    ) -> Result<Vec<AssetRef>, ScraperError> {
        let Some(browser) = &self.browser else {
            return Ok(Vec::new());
        };
        let rendered = browser.render(url, profile).await?;
        if let Some(indicator) = geo_block_indicator(rendered.title.as_deref(), &rendered.final_url)
        {
            return Err(ScraperError::GeoBlocked {
                url: rendered.final_url,
                indicator,
            });
        }
        let images = classify_elements(
            &rendered.final_url,
            &rendered.images,
            tokens,
            self.max_images_per_page,
        );
        let page = PageContext {
            requested_url: url.to_string(),
            final_url: rendered.final_url,
            status: rendered.status,
            title: rendered.title,
        };
        Ok(to_assets(brand, &page, images))
    }
}

fn to_assets(brand: &BrandEntity, page: &PageContext, images: Vec<PageImage>) -> Vec<AssetRef> {
    let redirect_target = (normalize_url_key(&page.final_url)
        != normalize_url_key(&page.requested_url))
    .then(|| page.final_url.clone());

    images
        .into_iter()
        .zip(0u32..)
        .map(|(image, rank)| {
            let mut asset = AssetRef::new(&brand.id, SourceType::DirectSite, image.url);
            asset.discovery_rank = Some(rank);
            asset.context_text = (!image.context.is_empty()).then_some(image.context);
            asset.page_url = Some(page.requested_url.clone());
            asset.page_title.clone_from(&page.title);
            asset.page_status = page.status;
            asset.redirect_target.clone_from(&redirect_target);
            asset
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for DirectSiteAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::DirectSite
    }

    async fn discover(
        &self,
        brand: &BrandEntity,
        candidate: &Candidate,
    ) -> Result<AdapterOutput, ScraperError> {
        let CandidateTarget::DirectSite { url } = &candidate.target else {
            return Err(wrong_target(SourceType::DirectSite, candidate));
        };

        if looks_like_image_path(url) {
            let mut asset = AssetRef::new(&brand.id, SourceType::DirectSite, url.clone());
            asset.discovery_rank = candidate.discovery_rank;
            asset.context_text.clone_from(&candidate.context_text);
            return Ok(AdapterOutput::assets(vec![asset]));
        }

        let assets = self.expand_page(brand, url).await?;
        Ok(AdapterOutput::assets(assets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::RenderedPage;
    use crate::html::ImageElement;
    use crate::test_support::{brand, StubFetcher};

    fn adapter(http: StubFetcher, browser: Option<Arc<dyn HeadlessBrowser>>) -> DirectSiteAdapter {
        DirectSiteAdapter::new(Arc::new(http), browser, Duration::from_secs(5), 5)
    }

    struct FixedBrowser;

    #[async_trait]
    impl HeadlessBrowser for FixedBrowser {
        async fn render(
            &self,
            url: &str,
            _profile: &RequestProfile,
        ) -> Result<RenderedPage, ScraperError> {
            Ok(RenderedPage {
                final_url: url.to_string(),
                status: Some(200),
                title: Some("Acme Casino".to_string()),
                images: vec![ImageElement {
                    src: "/rendered-logo.svg".to_string(),
                    class: Some("logo".to_string()),
                    ..ImageElement::default()
                }],
            })
        }
    }

    #[tokio::test]
    async fn image_urls_pass_through_without_fetching() {
        let http = StubFetcher::new();
        let calls = http.calls();
        let adapter = adapter(http, None);
        let acme = brand("acme", "Acme Casino", Some("https://acme.example"));
        let candidate = Candidate::direct_site("acme", "https://acme.example/logo.svg");
        let out = adapter.discover(&acme, &candidate).await.unwrap();
        assert_eq!(out.assets.len(), 1);
        assert_eq!(out.assets[0].url, "https://acme.example/logo.svg");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn page_images_carry_page_context() {
        let http = StubFetcher::new().html(
            "https://acme.example",
            r#"<title>Acme Casino</title><img class="logo" src="/img/acme-logo.png">"#,
        );
        let adapter = adapter(http, None);
        let acme = brand("acme", "Acme Casino", Some("https://acme.example"));
        let candidate = Candidate::direct_site("acme", "https://acme.example");
        let out = adapter.discover(&acme, &candidate).await.unwrap();
        let asset = &out.assets[0];
        assert_eq!(asset.url, "https://acme.example/img/acme-logo.png");
        assert_eq!(asset.page_title.as_deref(), Some("Acme Casino"));
        assert_eq!(asset.page_status, Some(200));
        assert_eq!(asset.page_url.as_deref(), Some("https://acme.example"));
        assert_eq!(asset.redirect_target, None);
        assert_eq!(asset.discovery_rank, Some(0));
    }

    #[tokio::test]
    async fn redirected_page_records_target() {
        let http = StubFetcher::new()
            .redirect("https://acme.example", "https://acme-mirror.example/en")
            .html(
                "https://acme-mirror.example/en",
                r#"<img alt="Acme" src="/acme.png">"#,
            );
        let adapter = adapter(http, None);
        let acme = brand("acme", "Acme", Some("https://acme.example"));
        let assets = adapter.expand_page(&acme, "https://acme.example").await.unwrap();
        assert_eq!(
            assets[0].redirect_target.as_deref(),
            Some("https://acme-mirror.example/en")
        );
        assert_eq!(assets[0].url, "https://acme-mirror.example/acme.png");
    }

    #[tokio::test]
    async fn geo_block_page_is_reported() {
        let http = StubFetcher::new().html(
            "https://acme.example",
            "<title>Access restricted in your country</title>",
        );
        let adapter = adapter(http, None);
        let acme = brand("acme", "Acme", Some("https://acme.example"));
        let err = adapter
            .expand_page(&acme, "https://acme.example")
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::GeoBlocked { .. }));
    }

    #[tokio::test]
    async fn page_request_uses_region_profile() {
        let http = StubFetcher::new().html("https://acme.example", "<title>Acme</title>");
        let calls = http.calls();
        let adapter = adapter(http, None);
        let mut acme = brand("acme", "Acme", Some("https://acme.example"));
        acme.restricted_regions.insert("CA".to_string());
        adapter.expand_page(&acme, "https://acme.example").await.unwrap();
        let calls = calls.lock().unwrap();
        let headers = &calls[0].headers;
        assert!(headers
            .iter()
            .any(|(k, v)| k == "accept-language" && v.starts_with("en-AU")));
    }

    #[tokio::test]
    async fn bot_challenge_without_browser_is_rejected() {
        let http = StubFetcher::new().html(
            "https://acme.example",
            "<title>Just a moment...</title><script src=\"/cdn-cgi/challenge-platform/x.js\"></script>",
        );
        let adapter = adapter(http, None);
        let acme = brand("acme", "Acme", Some("https://acme.example"));
        let err = adapter
            .expand_page(&acme, "https://acme.example")
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Rejected { .. }));
    }

    #[tokio::test]
    async fn browser_renders_when_static_html_has_no_logo() {
        let http = StubFetcher::new().html("https://acme.example", "<div id=\"app\"></div>");
        let adapter = adapter(http, Some(Arc::new(FixedBrowser)));
        let acme = brand("acme", "Acme Casino", Some("https://acme.example"));
        let assets = adapter.expand_page(&acme, "https://acme.example").await.unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].url, "https://acme.example/rendered-logo.svg");
        assert_eq!(assets[0].page_title.as_deref(), Some("Acme Casino"));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let http = StubFetcher::new().status("https://acme.example", 404);
        let adapter = adapter(http, None);
        let acme = brand("acme", "Acme", Some("https://acme.example"));
        let err = adapter
            .expand_page(&acme, "https://acme.example")
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn rejects_foreign_candidates() {
        let adapter = adapter(StubFetcher::new(), None);
        let acme = brand("acme", "Acme", None);
        let err = adapter
            .discover(&acme, &Candidate::curated_logo_api("acme", "acme.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::InvalidUrl { .. }));
    }
}
