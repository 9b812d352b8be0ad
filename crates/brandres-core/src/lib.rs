//! Shared data model and configuration for the brand asset resolution engine.

pub mod app_config;
pub mod brands;
pub mod config;
pub mod model;
pub mod tuning;

pub use app_config::{AppConfig, Environment};
pub use brands::{load_brands, BrandConfig, BrandsFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use model::{
    AlternativeAsset, AssetRef, BrandEntity, Candidate, CandidateTarget, ErrorKind, ImageFormat,
    ImageMetadata, MatchScore, ProgressEntry, ProgressStatus, QualityReason, QualityScore,
    ResolvedMapping, SourceType, ValidationResult,
};
pub use tuning::EngineTuning;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read brands file at {path}: {source}")]
    BrandsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse brands file: {0}")]
    BrandsFileParse(#[from] serde_yaml::Error),

    #[error("brands validation error: {0}")]
    Validation(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
