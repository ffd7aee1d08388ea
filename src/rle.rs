//! Label Studio brush RLE
//!
//! The stream is read most significant bit first:
//!
//! ```text
//! count:32  word_size-1:5  run_size[0..4]-1:4 each
//! repeat until `count` elements are produced:
//!     repeated:1  selector:2  length-1:run_size[selector]
//!     repeated == 1  -> one word, emitted `length` times
//!     repeated == 0  -> `length` literal words
//! ```
//!
//! The elements are the bytes of an RGBA image; a pixel belongs to the stroke when its
//! alpha byte is non-zero. Single-channel streams (one element per pixel) are accepted
//! as well.

use crate::error::DecodeError;
use crate::mask::BinaryMask;

struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn available(&self) -> usize {
        self.data.len() * 8
    }

    fn read(&mut self, bits: u32) -> Result<u32, DecodeError> {
        let needed = self.position + bits as usize;
        if needed > self.available() {
            return Err(DecodeError::Truncated {
                needed,
                available: self.available(),
            });
        }

        let mut value: u64 = 0;
        for _ in 0..bits {
            let byte = self.data[self.position / 8];
            let bit = (byte >> (7 - (self.position % 8))) & 1;
            value = (value << 1) | bit as u64;
            self.position += 1;
        }
        Ok(value as u32)
    }
}

/// Decode `bytes` into a mask of `width` x `height` pixels
///
/// The element count in the header is checked against the image size before the mask
/// is allocated.
pub fn decode_rle(bytes: &[u8], width: u32, height: u32) -> Result<BinaryMask, DecodeError> {
    if bytes.is_empty() {
        return Ok(BinaryMask::new(width, height));
    }

    let mut reader = BitReader::new(bytes);
    let count = reader.read(32)? as usize;
    if count == 0 {
        return Ok(BinaryMask::new(width, height));
    }

    let pixels = width as usize * height as usize;
    let channels = if pixels.checked_mul(4) == Some(count) {
        4
    } else if count == pixels {
        1
    } else {
        return Err(DecodeError::SizeMismatch {
            decoded: count,
            width,
            height,
        });
    };
    let mut mask = BinaryMask::new(width, height);

    let word_size = reader.read(5)? + 1;
    let mut run_sizes = [0u32; 4];
    for size in run_sizes.iter_mut() {
        *size = reader.read(4)? + 1;
    }

    let mut emit = |index: usize, value: u32| {
        if channels == 1 {
            mask.set_index(index, value > 0);
        } else if index % 4 == 3 {
            mask.set_index(index / 4, value > 0);
        }
    };

    let mut i = 0;
    while i < count {
        let repeated = reader.read(1)? == 1;
        let selector = reader.read(2)? as usize;
        let length = reader.read(run_sizes[selector])? as usize + 1;
        let end = i + length;
        if end > count {
            return Err(DecodeError::RunOverflow {
                position: end,
                count,
            });
        }

        if repeated {
            let value = reader.read(word_size)?;
            if value > 0 {
                (i..end).for_each(|index| emit(index, value));
            }
        } else {
            for index in i..end {
                let value = reader.read(word_size)?;
                emit(index, value);
            }
        }
        i = end;
    }

    Ok(mask)
}
