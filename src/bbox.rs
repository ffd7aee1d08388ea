//! Bounding box derivation from masks and explicit rectangles

use clap::ValueEnum;

use crate::error::BoxError;
use crate::mask::BinaryMask;
use crate::types::PixelBox;

/// Where a box comes from
#[derive(Debug, Clone, Copy)]
pub enum BoxSource<'a> {
    Mask(&'a BinaryMask),
    Rectangle(PixelBox),
}

/// Which source wins when an instance has both a mask and a rectangle
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum BoxPreference {
    /// The annotator's rectangle is ground truth; masks are a fallback
    #[default]
    Rectangle,
    /// Use the tight box around the mask
    Mask,
}

/// Derive a pixel-space box from a single source
pub fn derive_box(source: BoxSource<'_>, width: u32, height: u32) -> Result<PixelBox, BoxError> {
    match source {
        BoxSource::Mask(mask) => mask_to_bbox(mask),
        BoxSource::Rectangle(rect) => Ok(clamp_rectangle(&rect, width, height)),
    }
}

/// Tight box (min col, min row, max col, max row) around all set pixels
pub fn mask_to_bbox(mask: &BinaryMask) -> Result<PixelBox, BoxError> {
    let mut bounds: Option<(usize, usize, usize, usize)> = None;

    for (y, row) in mask.rows().enumerate() {
        let Some(first) = row.iter().position(|&p| p == 1) else {
            continue;
        };
        // A row with a first set pixel also has a last one
        let last = row.iter().rposition(|&p| p == 1).unwrap_or(first);
        bounds = Some(match bounds {
            None => (first, y, last, y),
            Some((x_min, y_min, x_max, _)) => (x_min.min(first), y_min, x_max.max(last), y),
        });
    }

    bounds
        .map(|(x_min, y_min, x_max, y_max)| {
            PixelBox::new(x_min as f64, y_min as f64, x_max as f64, y_max as f64)
        })
        .ok_or(BoxError::EmptyMask)
}

/// Reorder the corners and clamp them to the image bounds
pub fn clamp_rectangle(rect: &PixelBox, width: u32, height: u32) -> PixelBox {
    let clamp_x = |v: f64| v.max(0.0).min(width as f64);
    let clamp_y = |v: f64| v.max(0.0).min(height as f64);
    PixelBox::new(
        clamp_x(rect.xmin.min(rect.xmax)),
        clamp_y(rect.ymin.min(rect.ymax)),
        clamp_x(rect.xmin.max(rect.xmax)),
        clamp_y(rect.ymin.max(rect.ymax)),
    )
}

/// Pick the box for an instance that may carry a mask, a rectangle, or both
pub fn select_box(
    mask: Option<&BinaryMask>,
    rectangle: Option<PixelBox>,
    preference: BoxPreference,
    width: u32,
    height: u32,
) -> Result<PixelBox, BoxError> {
    match (mask, rectangle, preference) {
        (_, Some(rect), BoxPreference::Rectangle) | (None, Some(rect), BoxPreference::Mask) => {
            derive_box(BoxSource::Rectangle(rect), width, height)
        }
        (Some(mask), Some(rect), BoxPreference::Mask) => {
            match derive_box(BoxSource::Mask(mask), width, height) {
                Err(BoxError::EmptyMask) => {
                    log::debug!("Mask is empty, falling back to the rectangle");
                    derive_box(BoxSource::Rectangle(rect), width, height)
                }
                other => other,
            }
        }
        (Some(mask), None, _) => derive_box(BoxSource::Mask(mask), width, height),
        (None, None, _) => Err(BoxError::NoGeometry),
    }
}
