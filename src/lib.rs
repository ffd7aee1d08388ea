//! Label Studio to YOLO format converter
//!
//! This library decodes Label Studio brush masks, derives bounding boxes and writes
//! YOLO detection labels together with per-instance mask files.

pub mod aggregate;
pub mod bbox;
pub mod config;
pub mod conversion;
pub mod error;
pub mod io;
pub mod labelstudio;
pub mod mask;
pub mod registry;
pub mod rle;
pub mod types;
pub mod utils;
pub mod yolo;
pub mod yolo_dataset;

// Re-export commonly used types and functions
pub use aggregate::{aggregate_task, AggregateOptions, AggregatedTask, InstanceSkip, SkipReason};
pub use bbox::{derive_box, mask_to_bbox, select_box, BoxPreference, BoxSource};
pub use config::Args;
pub use conversion::{process_task, ConversionContext, TaskOutcome};
pub use error::{BoxError, DecodeError, FormatError, TaskError};
pub use labelstudio::ExportedTask;
pub use mask::{decode_mask, BinaryMask};
pub use registry::ClassRegistry;
pub use types::{Annotation, BrushEncoding, Geometry, Instance, PixelBox, ProcessingStats, Task};
pub use yolo::{denormalize, format_labels, normalize, NormalizedBox};
pub use yolo_dataset::process_dataset;
