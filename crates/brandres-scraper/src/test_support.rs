//! In-memory doubles shared by the unit tests.

use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use brandres_core::BrandEntity;

use crate::adapters::{SearchHit, SearchProvider};
use crate::error::ScraperError;
use crate::http::{HttpFetch, HttpRequest, HttpResponse};
use crate::origin::normalize_url_key;

#[derive(Clone)]
enum Route {
    Respond {
        status: u16,
        content_type: String,
        body: Vec<u8>,
    },
    Redirect(String),
    Timeout,
}

/// Serves canned responses keyed by normalized URL. Unknown URLs get 404.
#[derive(Clone, Default)]
pub(crate) struct StubFetcher {
    routes: HashMap<String, Route>,
    /// Remaining transient failures per URL, served before the route.
    failures: Arc<Mutex<HashMap<String, (u32, u16)>>>,
    calls: Arc<Mutex<Vec<HttpRequest>>>,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> Arc<Mutex<Vec<HttpRequest>>> {
        Arc::clone(&self.calls)
    }

    fn route(mut self, url: &str, route: Route) -> Self {
        self.routes.insert(normalize_url_key(url), route);
        self
    }

    pub(crate) fn html(self, url: &str, body: &str) -> Self {
        self.route(
            url,
            Route::Respond {
                status: 200,
                content_type: "text/html; charset=utf-8".to_string(),
                body: body.as_bytes().to_vec(),
            },
        )
    }

    pub(crate) fn image(self, url: &str, content_type: &str, body: Vec<u8>) -> Self {
        self.route(
            url,
            Route::Respond {
                status: 200,
                content_type: content_type.to_string(),
                body,
            },
        )
    }

    /// Serves `body` with no content-type header.
    pub(crate) fn untyped(self, url: &str, body: Vec<u8>) -> Self {
        self.image(url, "", body)
    }

    pub(crate) fn status(self, url: &str, status: u16) -> Self {
        self.route(
            url,
            Route::Respond {
                status,
                content_type: "text/plain".to_string(),
                body: Vec::new(),
            },
        )
    }

    pub(crate) fn redirect(self, from: &str, to: &str) -> Self {
        self.route(from, Route::Redirect(to.to_string()))
    }

    pub(crate) fn timeout(self, url: &str) -> Self {
        self.route(url, Route::Timeout)
    }

    pub(crate) fn failing(self, url: &str, times: u32, status: u16) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(normalize_url_key(url), (times, status));
        self
    }
}

#[async_trait]
impl HttpFetch for StubFetcher {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, ScraperError> {
        self.calls.lock().unwrap().push(request.clone());

        let key = normalize_url_key(&request.url);
        if let Some((remaining, status)) = self.failures.lock().unwrap().get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Ok(HttpResponse {
                    status: *status,
                    final_url: request.url.clone(),
                    headers: Vec::new(),
                    body: Vec::new(),
                });
            }
        }

        let mut url = request.url.clone();
        for _ in 0..5 {
            match self.routes.get(&normalize_url_key(&url)) {
                Some(Route::Redirect(to)) => url.clone_from(to),
                Some(Route::Respond {
                    status,
                    content_type,
                    body,
                }) => {
                    let headers = if content_type.is_empty() {
                        Vec::new()
                    } else {
                        vec![("content-type".to_string(), content_type.clone())]
                    };
                    return Ok(HttpResponse {
                        status: *status,
                        final_url: url,
                        headers,
                        body: body.clone(),
                    });
                }
                Some(Route::Timeout) => {
                    return Err(ScraperError::Timeout { url });
                }
                None => break,
            }
        }
        Ok(HttpResponse {
            status: 404,
            final_url: url,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: b"<title>Not Found</title>".to_vec(),
        })
    }
}

/// Returns fixed hits per query; unknown queries return nothing.
#[derive(Default)]
pub(crate) struct StubSearch {
    results: HashMap<String, Vec<SearchHit>>,
    pub(crate) queries: Mutex<Vec<String>>,
}

impl StubSearch {
    pub(crate) fn with(mut self, query: &str, hits: &[(&str, &str)]) -> Self {
        self.results.insert(
            query.to_string(),
            hits.iter()
                .map(|(url, title)| SearchHit {
                    url: (*url).to_string(),
                    title: (*title).to_string(),
                    snippet: String::new(),
                })
                .collect(),
        );
        self
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ScraperError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

pub(crate) fn brand(id: &str, name: &str, url: Option<&str>) -> BrandEntity {
    BrandEntity {
        id: id.to_string(),
        display_name: name.to_string(),
        known_url: url.map(str::to_string),
        restricted_regions: BTreeSet::new(),
    }
}

/// Deterministic noisy PNG; noise keeps it large and color-rich.
pub(crate) fn noisy_png(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let img = image::RgbaImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        image::Rgba([r, g, b, 255])
    });
    encode_png(img)
}

/// Single-color PNG; compresses to almost nothing.
pub(crate) fn flat_png(width: u32, height: u32) -> Vec<u8> {
    encode_png(image::RgbaImage::from_pixel(
        width,
        height,
        image::Rgba([40, 40, 40, 255]),
    ))
}

fn encode_png(img: image::RgbaImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode test png");
    buf
}
