//! Discovery, validation and scoring of brand logo assets.

pub mod adapters;
pub mod browser;
pub mod candidates;
pub mod confidence;
pub mod decode;
pub mod error;
pub mod fuzzy;
pub mod geo;
pub mod html;
pub mod http;
pub mod origin;
pub mod quality;
pub(crate) mod rate_limit;
pub mod resolver;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use adapters::{SearchHit, SearchProvider, SourceAdapter};
pub use browser::{HeadlessBrowser, RenderedPage};
pub use decode::{ImageDecoder, StandardDecoder};
pub use error::ScraperError;
pub use http::{HttpFetch, HttpRequest, HttpResponse, ReqwestFetcher};
pub use resolver::{Resolution, ResolutionStats, Resolver, ResolverDeps, ResolverSettings};
pub use validate::Validator;
