//! Optional rendering capability for pages whose logo only appears after
//! client-side JavaScript runs, or that sit behind a bot challenge.

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::geo::RequestProfile;
use crate::html::ImageElement;

/// What a rendering browser reports back about a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPage {
    pub final_url: String,
    pub status: Option<u16>,
    pub title: Option<String>,
    pub images: Vec<ImageElement>,
}

#[async_trait]
pub trait HeadlessBrowser: Send + Sync {
    /// Loads `url` with the given request profile and reports the images
    /// present once the page has settled.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] when the page cannot be loaded.
    async fn render(&self, url: &str, profile: &RequestProfile)
        -> Result<RenderedPage, ScraperError>;
}
