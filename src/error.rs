//! Error types for the conversion pipeline
//!
//! Instance-level errors (`DecodeError`, `BoxError`) are recovered by the aggregator and
//! only skip the offending instance. Task-level errors (`TaskError`) abort the output of
//! one task and are counted in the run summary.

use std::fmt;

/// A brush geometry that cannot be turned into a valid mask
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The bit stream ended before the declared element count was reached
    Truncated { needed: usize, available: usize },
    /// The decoded element count does not describe an image of the expected size
    SizeMismatch {
        decoded: usize,
        width: u32,
        height: u32,
    },
    /// A run writes past the declared element count
    RunOverflow { position: usize, count: usize },
    /// An RLE list element is not a byte
    ByteOutOfRange { index: usize, value: u32 },
    /// The base64 payload of a bitmap mask is invalid
    Base64(String),
    /// The bitmap mask is not a readable image
    Image(String),
    /// The bitmap mask has different dimensions than the task image
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, available } => write!(
                f,
                "RLE stream truncated: needed {} bits, {} available",
                needed, available
            ),
            DecodeError::SizeMismatch {
                decoded,
                width,
                height,
            } => write!(
                f,
                "RLE decodes to {} elements, which does not match a {}x{} image",
                decoded, width, height
            ),
            DecodeError::RunOverflow { position, count } => write!(
                f,
                "RLE run ending at {} overflows the declared {} elements",
                position, count
            ),
            DecodeError::ByteOutOfRange { index, value } => {
                write!(f, "RLE element {} has value {} (not a byte)", index, value)
            }
            DecodeError::Base64(e) => write!(f, "invalid base64 mask: {}", e),
            DecodeError::Image(e) => write!(f, "invalid mask bitmap: {}", e),
            DecodeError::DimensionMismatch { expected, found } => write!(
                f,
                "mask bitmap is {}x{}, expected {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Failure to derive a bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxError {
    /// The mask has no annotated pixel
    EmptyMask,
    /// Neither a mask nor a rectangle was available
    NoGeometry,
}

impl fmt::Display for BoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxError::EmptyMask => f.write_str("mask contains no annotated pixels"),
            BoxError::NoGeometry => f.write_str("annotation has neither a mask nor a rectangle"),
        }
    }
}

impl std::error::Error for BoxError {}

/// A normalized box that falls outside the unit square
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    ZeroDimension { width: u32, height: u32 },
    OutOfRange { field: &'static str, value: f64 },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::ZeroDimension { width, height } => {
                write!(f, "cannot normalize against a {}x{} image", width, height)
            }
            FormatError::OutOfRange { field, value } => {
                write!(f, "normalized {} = {} lies outside [0, 1]", field, value)
            }
        }
    }
}

impl std::error::Error for FormatError {}

/// A failure that aborts one task's output
#[derive(Debug)]
pub enum TaskError {
    /// Neither the payload nor the image file gives pixel dimensions
    MissingDimensions { task_id: String },
    Format {
        task_id: String,
        instance: usize,
        source: FormatError,
    },
    Io {
        task_id: String,
        source: std::io::Error,
    },
    /// Another task of the run already writes to the same output file names
    StemCollision {
        task_id: String,
        stem: String,
        other: String,
    },
}

impl TaskError {
    pub fn task_id(&self) -> &str {
        match self {
            TaskError::MissingDimensions { task_id }
            | TaskError::Format { task_id, .. }
            | TaskError::Io { task_id, .. }
            | TaskError::StemCollision { task_id, .. } => task_id,
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::MissingDimensions { task_id } => {
                write!(f, "task {}: no image dimensions available", task_id)
            }
            TaskError::Format {
                task_id,
                instance,
                source,
            } => write!(f, "task {} instance {}: {}", task_id, instance, source),
            TaskError::Io { task_id, source } => write!(f, "task {}: {}", task_id, source),
            TaskError::StemCollision {
                task_id,
                stem,
                other,
            } => write!(
                f,
                "task {}: output name '{}' is already used by task {}",
                task_id, stem, other
            ),
        }
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TaskError::MissingDimensions { .. } | TaskError::StemCollision { .. } => None,
            TaskError::Format { source, .. } => Some(source),
            TaskError::Io { source, .. } => Some(source),
        }
    }
}
