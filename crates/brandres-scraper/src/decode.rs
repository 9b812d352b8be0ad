//! Image decoding into [`ImageMetadata`].
//!
//! Raster formats go through the `image` crate. SVG is never rasterized;
//! its intrinsic size is read from the root element.

use std::sync::LazyLock;

use brandres_core::{ImageFormat, ImageMetadata};
use regex::Regex;
use thiserror::Error;

static SVG_ROOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<svg\b[^>]*>").expect("valid regex"));
static SVG_WIDTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\swidth\s*=\s*["']\s*([0-9.]+)\s*(?:px)?\s*["']"#).expect("valid regex")
});
static SVG_HEIGHT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\sheight\s*=\s*["']\s*([0-9.]+)\s*(?:px)?\s*["']"#).expect("valid regex")
});
static SVG_VIEWBOX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\sviewbox\s*=\s*["']\s*[-0-9.]+[\s,]+[-0-9.]+[\s,]+([0-9.]+)[\s,]+([0-9.]+)\s*["']"#)
        .expect("valid regex")
});

/// Larger images are sampled on a grid for channel statistics.
const MAX_SAMPLED_PIXELS: u64 = 262_144;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty body")]
    Empty,

    #[error("unrecognized image format")]
    UnknownFormat,

    #[error("svg has no intrinsic size")]
    SvgWithoutSize,

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Turns response bytes into objective image facts.
pub trait ImageDecoder: Send + Sync {
    /// # Errors
    ///
    /// Returns [`DecodeError`] when the bytes are not a decodable image.
    fn decode(&self, bytes: &[u8], content_type: Option<&str>)
        -> Result<ImageMetadata, DecodeError>;
}

/// Default decoder: `image` crate for rasters, root-element sniffing for SVG.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecoder;

impl ImageDecoder for StandardDecoder {
    fn decode(
        &self,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<ImageMetadata, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        if is_svg(bytes, content_type) {
            return decode_svg(bytes);
        }
        decode_raster(bytes)
    }
}

fn is_svg(bytes: &[u8], content_type: Option<&str>) -> bool {
    if content_type.is_some_and(|ct| ct.contains("svg")) {
        return true;
    }
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]);
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

fn decode_svg(bytes: &[u8]) -> Result<ImageMetadata, DecodeError> {
    let text = String::from_utf8_lossy(bytes);
    let root = SVG_ROOT_RE
        .find(&text)
        .ok_or(DecodeError::UnknownFormat)?
        .as_str();

    let number = |re: &Regex| -> Option<f64> {
        re.captures(root)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| *v > 0.0)
    };
    let (width, height) = match (number(&SVG_WIDTH_RE), number(&SVG_HEIGHT_RE)) {
        (Some(w), Some(h)) => (w, h),
        _ => {
            let caps = SVG_VIEWBOX_RE
                .captures(root)
                .ok_or(DecodeError::SvgWithoutSize)?;
            let w = caps[1].parse::<f64>().map_err(|_| DecodeError::SvgWithoutSize)?;
            let h = caps[2].parse::<f64>().map_err(|_| DecodeError::SvgWithoutSize)?;
            (w, h)
        }
    };

    Ok(ImageMetadata {
        width: to_pixels(width),
        height: to_pixels(height),
        byte_size: bytes.len() as u64,
        format: ImageFormat::Svg,
        channel_stddev: Vec::new(),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_pixels(value: f64) -> u32 {
    value.round().clamp(0.0, f64::from(u32::MAX)) as u32
}

fn decode_raster(bytes: &[u8]) -> Result<ImageMetadata, DecodeError> {
    let guessed = image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat)?;
    let format = match guessed {
        image::ImageFormat::Png => ImageFormat::Png,
        image::ImageFormat::Jpeg => ImageFormat::Jpeg,
        image::ImageFormat::Gif => ImageFormat::Gif,
        image::ImageFormat::WebP => ImageFormat::Webp,
        image::ImageFormat::Ico => ImageFormat::Ico,
        image::ImageFormat::Bmp => ImageFormat::Bmp,
        _ => ImageFormat::Other,
    };
    let decoded = image::load_from_memory_with_format(bytes, guessed)?;
    let rgba = decoded.to_rgba8();

    Ok(ImageMetadata {
        width: rgba.width(),
        height: rgba.height(),
        byte_size: bytes.len() as u64,
        format,
        channel_stddev: channel_stddev(&rgba),
    })
}

/// Population standard deviation of R, G, B and A.
#[allow(clippy::cast_precision_loss)]
fn channel_stddev(rgba: &image::RgbaImage) -> Vec<f64> {
    let total = u64::from(rgba.width()) * u64::from(rgba.height());
    if total == 0 {
        return vec![0.0; 4];
    }
    let step = usize::try_from(total.div_ceil(MAX_SAMPLED_PIXELS)).unwrap_or(1).max(1);

    let mut sum = [0.0f64; 4];
    let mut sum_sq = [0.0f64; 4];
    let mut count = 0.0f64;
    for pixel in rgba.pixels().step_by(step) {
        for (i, channel) in pixel.0.iter().enumerate() {
            let v = f64::from(*channel);
            sum[i] += v;
            sum_sq[i] += v * v;
        }
        count += 1.0;
    }

    (0..4)
        .map(|i| {
            let mean = sum[i] / count;
            (sum_sq[i] / count - mean * mean).max(0.0).sqrt()
        })
        .collect()
}
