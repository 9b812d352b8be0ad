//! URL origin, host and domain helpers.

use reqwest::Url;

/// Two-label public suffixes seen on brand domains. Anything else is
/// treated as a single-label suffix.
const MULTI_LABEL_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "com.au", "net.au", "co.nz", "com.br", "co.za", "com.mt", "co.in",
];

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".svg", ".jpg", ".jpeg", ".gif", ".webp", ".ico", ".bmp"];

/// Extracts the scheme+host origin from a URL.
///
/// Given `"https://acme.example/en/casino"`, returns `"https://acme.example"`.
/// Returns `None` for anything that is not an absolute http(s) URL.
#[must_use]
pub fn extract_origin(url: &str) -> Option<String> {
    let parsed = parse_http_url(url)?;
    Some(parsed.origin().ascii_serialization())
}

/// Lowercased hostname with any leading `www.` removed.
#[must_use]
pub fn extract_host(url: &str) -> Option<String> {
    let parsed = parse_http_url(url)?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// The registrable part of a hostname: `cdn.acme.co.uk` becomes `acme.co.uk`.
#[must_use]
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return labels.join(".");
    }
    let last_two = labels[labels.len() - 2..].join(".");
    let keep = if MULTI_LABEL_SUFFIXES.contains(&last_two.as_str()) {
        3
    } else {
        2
    };
    labels[labels.len().saturating_sub(keep)..].join(".")
}

/// The brand-bearing label of a host: `www.acme-casino.co.uk` becomes `acme-casino`.
#[must_use]
pub fn domain_label(host: &str) -> String {
    let registrable = registrable_domain(host);
    registrable
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Dedup key for URLs that point at the same resource: lowercase host
/// without `www.`, no fragment, no trailing slash.
#[must_use]
pub fn normalize_url_key(url: &str) -> String {
    let Some(parsed) = parse_http_url(url) else {
        return url.trim().trim_end_matches('/').to_ascii_lowercase();
    };
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
    let path = parsed.path().trim_end_matches('/');
    let query = parsed.query().map(|q| format!("?{q}")).unwrap_or_default();
    format!("{}://{host}{port}{path}{query}", parsed.scheme())
}

/// `true` when the URL path ends in a known image extension.
#[must_use]
pub fn looks_like_image_path(url: &str) -> bool {
    let path = parse_http_url(url).map_or_else(
        || url.split(['?', '#']).next().unwrap_or_default().to_string(),
        |u| u.path().to_string(),
    );
    let lowered = path.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext))
}

/// Resolves `candidate` against `base_url`, decoding `&amp;` first.
#[must_use]
pub fn absolutize_url(base_url: &str, candidate: &str) -> Option<String> {
    let candidate = candidate.replace("&amp;", "&");
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate.starts_with("data:") {
        return None;
    }
    let base = Url::parse(base_url).ok()?;
    let joined = base.join(candidate).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// `true` when both URLs resolve to the same registrable domain.
#[must_use]
pub fn same_site(a: &str, b: &str) -> bool {
    match (extract_host(a), extract_host(b)) {
        (Some(x), Some(y)) => registrable_domain(&x) == registrable_domain(&y),
        _ => false,
    }
}

fn parse_http_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_drops_path_and_query() {
        assert_eq!(
            extract_origin("https://acme.example/en/casino?ref=1").as_deref(),
            Some("https://acme.example")
        );
        assert_eq!(extract_origin("acme.example"), None);
        assert_eq!(extract_origin("ftp://acme.example"), None);
    }

    #[test]
    fn host_strips_www_and_lowercases() {
        assert_eq!(
            extract_host("https://WWW.Acme.Example/x").as_deref(),
            Some("acme.example")
        );
    }

    #[test]
    fn registrable_domain_handles_multi_label_suffixes() {
        assert_eq!(registrable_domain("cdn.acme.com"), "acme.com");
        assert_eq!(registrable_domain("static.acme.co.uk"), "acme.co.uk");
        assert_eq!(registrable_domain("acme.com"), "acme.com");
        assert_eq!(domain_label("www.acme-casino.co.uk"), "acme-casino");
    }

    #[test]
    fn url_key_ignores_www_case_and_trailing_slash() {
        assert_eq!(
            normalize_url_key("https://www.ACME.example/"),
            normalize_url_key("https://acme.example")
        );
        assert_ne!(
            normalize_url_key("https://acme.example/logo.png"),
            normalize_url_key("https://acme.example/logo.svg")
        );
    }

    #[test]
    fn detects_image_paths() {
        assert!(looks_like_image_path("https://acme.example/assets/logo.PNG"));
        assert!(looks_like_image_path("https://acme.example/logo.svg?v=3"));
        assert!(!looks_like_image_path("https://acme.example/"));
        assert!(!looks_like_image_path("https://acme.example/png-guide"));
    }

    #[test]
    fn absolutize_resolves_relative_and_rejects_data_uris() {
        assert_eq!(
            absolutize_url("https://acme.example/en/", "../img/logo.png?a=1&amp;b=2").as_deref(),
            Some("https://acme.example/img/logo.png?a=1&b=2")
        );
        assert_eq!(absolutize_url("https://acme.example", "data:image/png;base64,AAA"), None);
        assert_eq!(absolutize_url("https://acme.example", "javascript:void(0)"), None);
    }

    #[test]
    fn same_site_compares_registrable_domains() {
        assert!(same_site("https://cdn.acme.com/a.png", "https://www.acme.com/"));
        assert!(!same_site("https://acme.com/", "https://blocked.example/"));
    }
}
