use async_trait::async_trait;
use brandres_core::{AssetRef, BrandEntity, Candidate, CandidateTarget, SourceType};

use super::{wrong_target, AdapterOutput, SourceAdapter};
use crate::error::ScraperError;
use crate::origin::extract_origin;

/// Well-known icon paths, largest first.
const ICON_PATHS: &[&str] = &["/apple-touch-icon.png", "/favicon.png", "/favicon.ico"];

/// Last resort: the site's own icons. They are usually small, so the
/// quality floor rejects most of them.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaviconFallbackAdapter;

#[async_trait]
impl SourceAdapter for FaviconFallbackAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::FaviconFallback
    }

    async fn discover(
        &self,
        brand: &BrandEntity,
        candidate: &Candidate,
    ) -> Result<AdapterOutput, ScraperError> {
        let CandidateTarget::FaviconFallback { origin } = &candidate.target else {
            return Err(wrong_target(SourceType::FaviconFallback, candidate));
        };
        let origin = extract_origin(origin).ok_or_else(|| ScraperError::InvalidUrl {
            url: origin.clone(),
            reason: "not an absolute http(s) origin".to_string(),
        })?;

        let assets = ICON_PATHS
            .iter()
            .zip(0u32..)
            .map(|(path, rank)| {
                let mut asset =
                    AssetRef::new(&brand.id, SourceType::FaviconFallback, format!("{origin}{path}"));
                asset.discovery_rank = Some(rank);
                asset.page_url = Some(origin.clone());
                asset
            })
            .collect();
        Ok(AdapterOutput::assets(assets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::brand;

    #[tokio::test]
    async fn tries_well_known_icon_paths() {
        let acme = brand("acme", "Acme", Some("https://acme.example"));
        let out = FaviconFallbackAdapter
            .discover(&acme, &Candidate::favicon_fallback("acme", "https://acme.example/"))
            .await
            .unwrap();
        let urls: Vec<&str> = out.assets.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://acme.example/apple-touch-icon.png",
                "https://acme.example/favicon.png",
                "https://acme.example/favicon.ico",
            ]
        );
        assert!(out
            .assets
            .iter()
            .all(|a| a.source_type == SourceType::FaviconFallback));
    }

    #[tokio::test]
    async fn invalid_origin_is_an_error() {
        let acme = brand("acme", "Acme", None);
        let err = FaviconFallbackAdapter
            .discover(&acme, &Candidate::favicon_fallback("acme", "not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::InvalidUrl { .. }));
    }
}
