//! YOLO label normalization and serialization

use crate::error::FormatError;
use crate::types::{Instance, PixelBox};

/// Default number of decimals in label files
pub const DEFAULT_PRECISION: usize = 6;

/// Box in unit space, center based
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

/// Scale a pixel box into unit space; values outside [0, 1] are a data error
pub fn normalize(
    bbox: &PixelBox,
    image_width: u32,
    image_height: u32,
) -> Result<NormalizedBox, FormatError> {
    if image_width == 0 || image_height == 0 {
        return Err(FormatError::ZeroDimension {
            width: image_width,
            height: image_height,
        });
    }
    let w = image_width as f64;
    let h = image_height as f64;

    let normalized = NormalizedBox {
        x_center: (bbox.xmin + bbox.xmax) / 2.0 / w,
        y_center: (bbox.ymin + bbox.ymax) / 2.0 / h,
        width: (bbox.xmax - bbox.xmin) / w,
        height: (bbox.ymax - bbox.ymin) / h,
    };

    for (field, value) in [
        ("x_center", normalized.x_center),
        ("y_center", normalized.y_center),
        ("width", normalized.width),
        ("height", normalized.height),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(FormatError::OutOfRange { field, value });
        }
    }

    Ok(normalized)
}

/// Map a normalized box back to pixel space
pub fn denormalize(bbox: &NormalizedBox, image_width: u32, image_height: u32) -> PixelBox {
    let w = image_width as f64;
    let h = image_height as f64;
    let half_width = bbox.width * w / 2.0;
    let half_height = bbox.height * h / 2.0;
    PixelBox::new(
        bbox.x_center * w - half_width,
        bbox.y_center * h - half_height,
        bbox.x_center * w + half_width,
        bbox.y_center * h + half_height,
    )
}

/// Fixed-precision number with trailing zeros removed (`0.200000` -> `0.2`)
pub fn format_coordinate(value: f64, precision: usize) -> String {
    let formatted = format!("{:.*}", precision, value);
    if !formatted.contains('.') {
        return formatted;
    }
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

/// `class_id x_center y_center width height`
pub fn format_line(class_id: usize, bbox: &NormalizedBox, precision: usize) -> String {
    format!(
        "{} {} {} {} {}",
        class_id,
        format_coordinate(bbox.x_center, precision),
        format_coordinate(bbox.y_center, precision),
        format_coordinate(bbox.width, precision),
        format_coordinate(bbox.height, precision)
    )
}

/// One line per instance, in instance order
///
/// On failure the index of the offending instance is returned with the error.
pub fn format_labels(
    instances: &[Instance],
    image_width: u32,
    image_height: u32,
    precision: usize,
) -> Result<Vec<String>, (usize, FormatError)> {
    instances
        .iter()
        .map(|instance| {
            normalize(&instance.bbox, image_width, image_height)
                .map(|bbox| format_line(instance.class_id, &bbox, precision))
                .map_err(|e| (instance.index, e))
        })
        .collect()
}
