//! Pure helpers for the ingestion workflow: re-encoding the classifier's
//! annotated image, crop geometry, and turning classifier output into
//! image metadata.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use thiserror::Error;

/// Label the classifier uses for "no answer".
const NOT_DETECTED: &str = "not detected";

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("processed image is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("processed image could not be decoded: {0}")]
    Decode(image::ImageError),
    #[error("processed image could not be encoded as PNG: {0}")]
    Encode(image::ImageError),
    #[error("invalid dimensions '{0}'")]
    Dimensions(String),
}

/// Decodes a base64 image (a `data:` URL prefix is tolerated) and re-encodes it as RGB PNG.
pub fn reencode_png(image_base64: &str) -> Result<Vec<u8>, ImagingError> {
    let payload = match image_base64.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => image_base64,
    };
    let raw = STANDARD.decode(payload.trim())?;
    let decoded = image::load_from_memory(&raw).map_err(ImagingError::Decode)?;
    let rgb = decoded.to_rgb8();

    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Png).map_err(ImagingError::Encode)?;
    Ok(out.into_inner())
}

/// Parses `"width,height"` into a crop aspect ratio rounded to four decimals.
///
/// Blank input means no crop. Two integers where either is not positive also
/// mean no crop; anything else is an error.
pub fn parse_dimensions(raw: &str) -> Result<Option<f64>, ImagingError> {
    if raw.is_empty() {
        return Ok(None);
    }
    let invalid = || ImagingError::Dimensions(raw.to_string());

    let mut parts = raw.split(',');
    let (Some(w), Some(h), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    let w: i64 = w.trim().parse().map_err(|_| invalid())?;
    let h: i64 = h.trim().parse().map_err(|_| invalid())?;

    if w <= 0 || h <= 0 {
        return Ok(None);
    }
    Ok(Some((w as f64 / h as f64 * 10_000.0).round() / 10_000.0))
}

/// Label whose bounding box has the largest `w * h` area.
///
/// Labels are visited in the order given and boxes in list order; a later box
/// must be strictly larger to win, so ties keep the first one seen. Boxes that
/// are not exactly `[x, y, w, h]` are skipped and a zero area never wins.
pub fn primary_object(detections: &[(String, Vec<Vec<f64>>)]) -> Option<String> {
    let mut best: Option<&str> = None;
    let mut max_area = 0.0_f64;

    for (label, boxes) in detections {
        for bbox in boxes {
            let [_, _, w, h] = bbox.as_slice() else {
                continue;
            };
            let area = w * h;
            if area > max_area {
                max_area = area;
                best = Some(label);
            }
        }
    }
    best.map(str::to_string)
}

/// Scene metadata derived from the classifier's `[scene, _, time_of_day, weather]` labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneLabels {
    pub indoor: bool,
    pub daytime: Option<String>,
    pub weather: Option<String>,
}

impl SceneLabels {
    pub fn from_classification(labels: &[String]) -> Option<Self> {
        let [scene, _, time_of_day, weather] = labels else {
            return None;
        };
        Some(Self {
            indoor: scene.eq_ignore_ascii_case("indoor"),
            daytime: detected(time_of_day),
            weather: detected(weather),
        })
    }
}

fn detected(label: &str) -> Option<String> {
    if label.to_lowercase() == NOT_DETECTED {
        None
    } else {
        Some(label.to_string())
    }
}

#[cfg(test)]
pub(crate) fn sample_png_base64() -> String {
    let img = image::RgbImage::from_pixel(4, 3, image::Rgb([200, 40, 10]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode sample png");
    STANDARD.encode(buf.into_inner())
}
