//! Logo extraction from a brand's HTML page.
//!
//! Ranking strongly prefers logo-like assets and de-prioritizes
//! favicon-sized icons, decorative banners and third-party marks
//! (payment methods, game providers, partner badges).

use std::sync::LazyLock;

use regex::Regex;

use crate::origin::absolutize_url;

static IMG_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("valid regex"));
static LINK_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid regex"));
static META_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid regex"));
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attr regex")
});
static SIZES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*x\s*(\d+)").expect("valid sizes regex"));

/// Markers that identify an image as somebody else's logo.
const EXCLUDED_MARKERS: &[&str] = &["payment", "provider", "game", "slot", "banner", "partner"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementSource {
    OgLogo,
    ImgLogo,
    TouchIcon,
    OgImage,
}

/// One image reference found on a page, with the text that surrounded it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub url: String,
    pub source: ElementSource,
    /// Lowercased alt/class/id markers, joined by spaces.
    pub context: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Raw attributes of an image element, as rendered by a browser or parsed
/// from static HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageElement {
    pub src: String,
    pub alt: Option<String>,
    pub class: Option<String>,
    pub id: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

/// Text of the first `<title>` element, whitespace-collapsed.
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let decoded = collapsed
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"");
    (!decoded.is_empty()).then_some(decoded)
}

/// Logo-like images on a page, best first, at most `limit` of them.
///
/// `brand_tokens` are lowercase fragments of the brand name; an `<img>`
/// qualifies when its markers mention "logo" or one of the tokens.
#[must_use]
pub fn extract_logo_images(
    base_url: &str,
    html: &str,
    brand_tokens: &[String],
    limit: usize,
) -> Vec<PageImage> {
    let mut images = collect_images(base_url, html, brand_tokens);
    rank_images(&mut images);
    images.truncate(limit);
    images
}

/// Applies the same qualification and ranking to elements reported by a
/// rendering browser.
#[must_use]
pub fn classify_elements(
    base_url: &str,
    elements: &[ImageElement],
    brand_tokens: &[String],
    limit: usize,
) -> Vec<PageImage> {
    let mut images: Vec<PageImage> = elements
        .iter()
        .filter_map(|el| {
            let marker = element_marker(el.alt.as_deref(), el.class.as_deref(), el.id.as_deref());
            qualify_img(base_url, &el.src, marker, el.width, el.height, brand_tokens)
        })
        .collect();
    rank_images(&mut images);
    images.truncate(limit);
    images
}

fn rank_images(images: &mut Vec<PageImage>) {
    let mut seen = std::collections::HashSet::new();
    images.retain(|img| seen.insert(img.url.clone()));
    // Stable sort keeps document order among equal scores.
    images.sort_by_key(|img| std::cmp::Reverse(score_image(img)));
}

fn collect_images(base_url: &str, html: &str, brand_tokens: &[String]) -> Vec<PageImage> {
    let mut images: Vec<PageImage> = Vec::new();

    for key in ["og:logo", "og:image"] {
        if let Some(url) = find_meta_content(html, "property", key)
            .and_then(|raw| absolutize_url(base_url, &raw))
        {
            if is_excluded(&url_path(&url), brand_tokens) {
                continue;
            }
            images.push(PageImage {
                url,
                source: if key == "og:logo" {
                    ElementSource::OgLogo
                } else {
                    ElementSource::OgImage
                },
                context: key.to_string(),
                width: None,
                height: None,
            });
        }
    }

    for m in IMG_TAG_RE.find_iter(html) {
        let tag = m.as_str();
        let marker = element_marker(
            extract_attr(tag, "alt").as_deref(),
            extract_attr(tag, "class").as_deref(),
            extract_attr(tag, "id").as_deref(),
        );
        let Some(src) = extract_attr(tag, "src")
            .or_else(|| extract_attr(tag, "data-src"))
        else {
            continue;
        };
        let width = extract_attr(tag, "width").and_then(|v| v.parse::<i32>().ok());
        let height = extract_attr(tag, "height").and_then(|v| v.parse::<i32>().ok());
        if let Some(image) = qualify_img(base_url, &src, marker, width, height, brand_tokens) {
            images.push(image);
        }
    }

    for m in LINK_TAG_RE.find_iter(html) {
        let tag = m.as_str();
        let Some(rel) = extract_attr(tag, "rel").map(|r| r.to_ascii_lowercase()) else {
            continue;
        };
        // Plain favicons are the favicon adapter's job.
        if !rel.contains("apple-touch-icon") {
            continue;
        }
        let Some(href) = extract_attr(tag, "href").and_then(|raw| absolutize_url(base_url, &raw))
        else {
            continue;
        };
        let (width, height) = extract_attr(tag, "sizes")
            .as_deref()
            .and_then(parse_sizes_attr)
            .unwrap_or((None, None));
        images.push(PageImage {
            url: href,
            source: ElementSource::TouchIcon,
            context: rel,
            width,
            height,
        });
    }

    images
}

fn element_marker(alt: Option<&str>, class: Option<&str>, id: Option<&str>) -> String {
    [alt, class, id]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn qualify_img(
    base_url: &str,
    src: &str,
    marker: String,
    width: Option<i32>,
    height: Option<i32>,
    brand_tokens: &[String],
) -> Option<PageImage> {
    let url = absolutize_url(base_url, src)?;
    // The host is left out: every image on acme.example would otherwise
    // "mention" acme.
    let haystack = format!("{marker} {}", url_path(&url));
    if is_excluded(&haystack, brand_tokens) {
        return None;
    }
    let mentions_brand = brand_tokens
        .iter()
        .any(|t| t.len() >= 3 && haystack.contains(t.as_str()));
    if !haystack.contains("logo") && !mentions_brand {
        return None;
    }
    Some(PageImage {
        url,
        source: ElementSource::ImgLogo,
        context: marker,
        width,
        height,
    })
}

fn url_path(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Brand words are cut out of `haystack` first, so "Slot Lair" artwork is
/// not mistaken for a slot game tile.
fn is_excluded(haystack: &str, brand_tokens: &[String]) -> bool {
    let mut tokens: Vec<&str> = brand_tokens
        .iter()
        .map(String::as_str)
        .filter(|t| t.len() >= 3)
        .collect();
    tokens.sort_by_key(|t| std::cmp::Reverse(t.len()));
    let mut rest = haystack.to_string();
    for token in tokens {
        rest = rest.replace(token, " ");
    }
    EXCLUDED_MARKERS.iter().any(|m| rest.contains(m))
}

#[allow(clippy::case_sensitive_file_extension_comparisons)] // url_lower is already lowercased
fn score_image(image: &PageImage) -> i32 {
    let mut score = match image.source {
        ElementSource::OgLogo => 600,
        ElementSource::ImgLogo => 500,
        ElementSource::OgImage => 340,
        ElementSource::TouchIcon => 120,
    };

    let url_lower = image.url.to_ascii_lowercase();

    score += if url_lower.ends_with(".svg") || url_lower.contains(".svg?") {
        120
    } else if url_lower.ends_with(".png") || url_lower.contains(".png?") {
        100
    } else if url_lower.ends_with(".webp") || url_lower.contains(".webp?") {
        70
    } else if url_lower.ends_with(".jpg")
        || url_lower.contains(".jpg?")
        || url_lower.ends_with(".jpeg")
        || url_lower.contains(".jpeg?")
    {
        50
    } else if url_lower.ends_with(".ico") || url_lower.contains(".ico?") {
        -260
    } else {
        0
    };

    if url_lower.contains("favicon") {
        score -= 220;
    }
    if url_lower.contains("logo") || image.context.contains("logo") {
        score += 80;
    }
    if image.context.contains("header") || image.context.contains("brand") {
        score += 30;
    }

    if let (Some(w), Some(h)) = (image.width, image.height) {
        let min_dim = w.min(h);
        if min_dim <= 32 {
            score -= 260;
        } else if min_dim <= 64 {
            score -= 160;
        } else if min_dim >= 220 {
            score += 90;
        } else if min_dim >= 120 {
            score += 45;
        }
    }

    score
}

fn parse_sizes_attr(value: &str) -> Option<(Option<i32>, Option<i32>)> {
    let caps = SIZES_RE.captures(value)?;
    let width = caps.get(1).and_then(|m| m.as_str().parse::<i32>().ok());
    let height = caps.get(2).and_then(|m| m.as_str().parse::<i32>().ok());
    Some((width, height))
}

fn find_meta_content(html: &str, key_attr: &str, key_value: &str) -> Option<String> {
    META_TAG_RE.find_iter(html).find_map(|m| {
        let tag = m.as_str();
        let key = extract_attr(tag, key_attr).or_else(|| extract_attr(tag, "name"))?;
        if key.eq_ignore_ascii_case(key_value) {
            extract_attr(tag, "content")
        } else {
            None
        }
    })
}

fn extract_attr(tag: &str, attr: &str) -> Option<String> {
    ATTR_RE.captures_iter(tag).find_map(|c| {
        let name = c.get(1)?.as_str();
        if !name.eq_ignore_ascii_case(attr) {
            return None;
        }
        let value = c.get(2).or_else(|| c.get(3))?.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}
