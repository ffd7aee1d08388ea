#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::Cursor;

/// MSB-first bit sink in the layout of Label Studio brush RLE
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            bits: 0,
        }
    }

    pub fn write(&mut self, value: u32, bits: u32) {
        for shift in (0..bits).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> shift) & 1 == 1 {
                let last = self.bytes.last_mut().unwrap();
                *last |= 1 << (7 - self.bits % 8);
            }
            self.bits += 1;
        }
    }

    pub fn header(&mut self, count: usize) {
        self.write(count as u32, 32);
        // 8-bit words, run sizes 3/4/8/16 bits as Label Studio writes them
        self.write(7, 5);
        for size in [3u32, 4, 8, 16] {
            self.write(size - 1, 4);
        }
    }

    pub fn finish(self) -> Vec<u32> {
        self.bytes.into_iter().map(u32::from).collect()
    }
}

/// Encode bytes with repeated runs only
pub fn encode_rle(values: &[u8]) -> Vec<u32> {
    let mut writer = BitWriter::new();
    writer.header(values.len());
    let mut i = 0;
    while i < values.len() {
        let mut j = i + 1;
        while j < values.len() && values[j] == values[i] && j - i < 1 << 16 {
            j += 1;
        }
        writer.write(1, 1);
        writer.write(3, 2);
        writer.write((j - i - 1) as u32, 16);
        writer.write(values[i] as u32, 8);
        i = j;
    }
    writer.finish()
}

/// Encode bytes with literal runs of up to 8 words
pub fn encode_rle_literal(values: &[u8]) -> Vec<u32> {
    let mut writer = BitWriter::new();
    writer.header(values.len());
    for chunk in values.chunks(8) {
        writer.write(0, 1);
        writer.write(0, 2);
        writer.write((chunk.len() - 1) as u32, 3);
        for &value in chunk {
            writer.write(value as u32, 8);
        }
    }
    writer.finish()
}

/// RGBA bytes of a brush layer: red, opaque where `set` holds
pub fn brush_rgba(width: u32, height: u32, set: impl Fn(u32, u32) -> bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            if set(x, y) {
                bytes.extend_from_slice(&[255, 0, 0, 255]);
            } else {
                bytes.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    bytes
}

pub fn brush_rle(width: u32, height: u32, set: impl Fn(u32, u32) -> bool) -> Vec<u32> {
    encode_rle(&brush_rgba(width, height, set))
}

/// Base64 PNG of a grayscale bitmap
pub fn png_base64(width: u32, height: u32, set: impl Fn(u32, u32) -> bool) -> String {
    let bitmap = GrayImage::from_fn(width, height, |x, y| Luma([if set(x, y) { 255 } else { 0 }]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(bitmap)
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    STANDARD.encode(bytes.into_inner())
}
