use brandres_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("{url} is not an image (content-type {content_type:?})")]
    NotAnImage {
        url: String,
        content_type: Option<String>,
    },

    #[error("could not decode image at {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("asset at {url} rejected: {reason}")]
    Rejected { url: String, reason: String },

    #[error("{url} appears geo-blocked ({indicator})")]
    GeoBlocked { url: String, indicator: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("run cancelled before request to {url}")]
    Cancelled { url: String },
}

impl ScraperError {
    /// Classification recorded on a failed [`brandres_core::ValidationResult`].
    ///
    /// Returns `None` for errors that never describe an asset, such as a
    /// client build failure or a cancelled run.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ScraperError::Timeout { .. } | ScraperError::Network { .. } => Some(ErrorKind::Network),
            ScraperError::HttpStatus { .. } => Some(ErrorKind::HttpStatus),
            ScraperError::NotAnImage { .. } => Some(ErrorKind::NotAnImage),
            ScraperError::Decode { .. } => Some(ErrorKind::Decode),
            ScraperError::GeoBlocked { .. } => Some(ErrorKind::GeoBlocked),
            ScraperError::Rejected { .. }
            | ScraperError::InvalidUrl { .. }
            | ScraperError::Deserialize { .. } => Some(ErrorKind::Rejected),
            ScraperError::ClientBuild(_) | ScraperError::Cancelled { .. } => None,
        }
    }
}
