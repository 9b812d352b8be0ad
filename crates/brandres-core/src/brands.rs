use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::BrandEntity;
use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandConfig {
    /// Explicit slug. Derived from `name` when omitted.
    #[serde(default)]
    pub slug: Option<String>,
    pub name: String,
    /// Seed URL for the brand's site. Optional; candidates fall back to
    /// name-derived domains without it.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub restricted_regions: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BrandConfig {
    /// The configured slug, or a URL-safe slug generated from the brand name.
    #[must_use]
    pub fn slug(&self) -> String {
        let source = self.slug.as_deref().unwrap_or(&self.name);
        source
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else if c == ' ' || c == '_' {
                    '-'
                } else {
                    '\0'
                }
            })
            .filter(|&c| c != '\0')
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Convert into the immutable entity the resolver works on.
    #[must_use]
    pub fn to_entity(&self) -> BrandEntity {
        BrandEntity {
            id: self.slug(),
            display_name: self.name.trim().to_string(),
            known_url: self
                .url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            restricted_regions: normalize_regions(&self.restricted_regions),
        }
    }
}

fn normalize_regions(regions: &[String]) -> BTreeSet<String> {
    regions
        .iter()
        .map(|r| r.trim().to_ascii_uppercase())
        .filter(|r| !r.is_empty())
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct BrandsFile {
    pub brands: Vec<BrandConfig>,
}

impl BrandsFile {
    /// Entities in configuration order.
    #[must_use]
    pub fn entities(&self) -> Vec<BrandEntity> {
        self.brands.iter().map(BrandConfig::to_entity).collect()
    }
}

/// Load and validate the brands configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_brands(path: &Path) -> Result<BrandsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::BrandsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let brands_file: BrandsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::BrandsFileParse)?;

    validate_brands(&brands_file)?;

    Ok(brands_file)
}

fn validate_brands(brands_file: &BrandsFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();
    let mut seen_slugs = HashSet::new();

    for brand in &brands_file.brands {
        if brand.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "brand name must be non-empty".to_string(),
            ));
        }

        let lower_name = brand.name.trim().to_lowercase();
        if !seen_names.insert(lower_name) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand name: '{}'",
                brand.name
            )));
        }

        let slug = brand.slug();
        if slug.is_empty() {
            return Err(ConfigError::Validation(format!(
                "brand '{}' produces an empty slug; set `slug` explicitly",
                brand.name
            )));
        }
        if !seen_slugs.insert(slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate brand slug: '{}' (from brand '{}')",
                slug, brand.name
            )));
        }

        if let Some(url) = brand.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            match url::Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => {
                    return Err(ConfigError::Validation(format!(
                        "brand '{}' has unsupported URL scheme '{}'",
                        brand.name,
                        parsed.scheme()
                    )));
                }
                Err(e) => {
                    return Err(ConfigError::Validation(format!(
                        "brand '{}' has invalid url '{url}': {e}",
                        brand.name
                    )));
                }
            }
        }

        for region in &brand.restricted_regions {
            let code = region.trim();
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::Validation(format!(
                    "brand '{}' has invalid restricted region '{region}'; expected a two-letter country code",
                    brand.name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "brands_test.rs"]
mod tests;
