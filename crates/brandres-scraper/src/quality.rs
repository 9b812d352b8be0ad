//! Heuristic 0–100 quality score for a decoded image.

use brandres_core::{EngineTuning, ImageFormat, ImageMetadata, QualityReason, QualityScore};

const BASE_SCORE: i32 = 40;

/// Below this on either side the image cannot be a usable logo at all.
const MIN_SIDE_PX: u32 = 8;
/// Wider than this aspect ratio is a banner strip, not a logo.
const MAX_ASPECT_RATIO: f64 = 16.0;

/// Scores `image` from its dimensions, byte size, format and color
/// variation. Pure: the same metadata always yields the same score.
#[must_use]
pub fn assess(image: &ImageMetadata, tuning: &EngineTuning) -> QualityScore {
    let mut score = BASE_SCORE;
    let mut reasons = Vec::new();
    let mut apply = |delta: i32, reason: QualityReason| {
        score += delta;
        reasons.push(reason);
    };

    if image.width >= 128 && image.height >= 64 {
        apply(15, QualityReason::GoodDimensions);
    }
    if image.width >= 256 && image.height >= 128 {
        apply(10, QualityReason::HighResolution);
    }
    if image.byte_size > 2_000 {
        apply(10, QualityReason::GoodFileSize);
    }
    if image.byte_size > 8_000 {
        apply(10, QualityReason::DetailedContent);
    }
    match image.format {
        ImageFormat::Png => apply(8, QualityReason::PngTransparency),
        ImageFormat::Svg => apply(12, QualityReason::VectorScalable),
        _ => {}
    }
    if image.color_variation() > tuning.color_stddev_threshold {
        apply(10, QualityReason::ColorRich);
    }
    if image.byte_size < 1_000 && image.max_dimension() <= 64 {
        apply(-20, QualityReason::LikelyPlaceholder);
    }

    QualityScore {
        value: u8::try_from(score.clamp(0, 100)).unwrap_or(0),
        reasons,
    }
}

/// Shape check applied before scoring. Returns the reason an image can
/// never be a logo, if it fails.
#[must_use]
pub fn shape_rejection(image: &ImageMetadata) -> Option<String> {
    if image.width < MIN_SIDE_PX || image.height < MIN_SIDE_PX {
        return Some(format!(
            "{}x{} is below the {MIN_SIDE_PX}px minimum",
            image.width, image.height
        ));
    }
    let (long, short) = (
        f64::from(image.width.max(image.height)),
        f64::from(image.width.min(image.height)),
    );
    if long / short > MAX_ASPECT_RATIO {
        return Some(format!(
            "aspect ratio {:.1} exceeds {MAX_ASPECT_RATIO}",
            long / short
        ));
    }
    None
}

/// `true` when the score clears the configured acceptance floor.
#[must_use]
pub fn is_acceptable(score: &QualityScore, tuning: &EngineTuning) -> bool {
    score.value >= tuning.acceptance_floor
}
