//! Binary masks and brush decoding
//!
//! A [`BinaryMask`] always has the pixel dimensions of its source image. Brush strokes
//! arrive either as Label Studio's bit-packed RLE (see [`crate::rle`]) or as a base64
//! encoded PNG bitmap.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{GrayImage, Luma};

use crate::error::DecodeError;
use crate::rle::decode_rle;
use crate::types::{BrushEncoding, PixelBox};

/// Row-major grid of 0/1 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl BinaryMask {
    /// All-zero mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    /// Mask with every pixel inside `bbox` set, clipped to the image
    pub fn from_box(width: u32, height: u32, bbox: &PixelBox) -> Self {
        let mut mask = Self::new(width, height);
        if width == 0 || height == 0 {
            return mask;
        }
        let x0 = (bbox.xmin.floor().max(0.0) as u32).min(width - 1);
        let y0 = (bbox.ymin.floor().max(0.0) as u32).min(height - 1);
        // Pixel i covers [i, i + 1), so the last covered column is ceil(xmax) - 1
        let x1 = (bbox.xmax.ceil() as i64 - 1).max(x0 as i64).min(width as i64 - 1) as u32;
        let y1 = (bbox.ymax.ceil() as i64 - 1).max(y0 as i64).min(height as i64 - 1) as u32;
        for y in y0..=y1 {
            for x in x0..=x1 {
                mask.set(x, y, true);
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.pixels[self.offset(x, y)] == 1
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let offset = self.offset(x, y);
        self.pixels[offset] = value as u8;
    }

    /// Set a pixel by its row-major index
    pub(crate) fn set_index(&mut self, index: usize, value: bool) {
        self.pixels[index] = value as u8;
    }

    /// Number of set pixels
    pub fn area(&self) -> u64 {
        self.pixels.iter().map(|&p| p as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }

    /// Iterate over the rows as slices of 0/1 values
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        // chunks_exact panics on a zero chunk size
        self.pixels.chunks_exact(self.width.max(1) as usize)
    }

    /// 8-bit grayscale raster (0 / 255) for writing to disk
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Decode a brush encoding into a mask of exactly `width` x `height` pixels
pub fn decode_mask(
    encoding: &BrushEncoding,
    width: u32,
    height: u32,
) -> Result<BinaryMask, DecodeError> {
    match encoding {
        BrushEncoding::Rle(rle) => {
            let bytes = rle_bytes(rle)?;
            decode_rle(&bytes, width, height)
        }
        BrushEncoding::Png(data) => decode_png_mask(data, width, height),
    }
}

fn rle_bytes(rle: &[u32]) -> Result<Vec<u8>, DecodeError> {
    rle.iter()
        .enumerate()
        .map(|(index, &value)| {
            u8::try_from(value).map_err(|_| DecodeError::ByteOutOfRange { index, value })
        })
        .collect()
}

fn decode_png_mask(data: &str, width: u32, height: u32) -> Result<BinaryMask, DecodeError> {
    // Strip a data URL prefix if present
    let payload = match data.split_once("base64,") {
        Some((_, rest)) => rest,
        None => data,
    }
    .trim();
    if payload.is_empty() {
        return Ok(BinaryMask::new(width, height));
    }

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    let bitmap = image::load_from_memory(&bytes).map_err(|e| DecodeError::Image(e.to_string()))?;
    if (bitmap.width(), bitmap.height()) != (width, height) {
        return Err(DecodeError::DimensionMismatch {
            expected: (width, height),
            found: (bitmap.width(), bitmap.height()),
        });
    }

    let mut mask = BinaryMask::new(width, height);
    if bitmap.color().has_alpha() {
        let rgba = bitmap.to_rgba8();
        for (x, y, pixel) in rgba.enumerate_pixels() {
            mask.set(x, y, pixel[3] > 0);
        }
    } else {
        let luma = bitmap.to_luma8();
        for (x, y, pixel) in luma.enumerate_pixels() {
            mask.set(x, y, pixel[0] > 0);
        }
    }
    Ok(mask)
}
