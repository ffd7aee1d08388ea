use std::path::PathBuf;

use crate::mask::BinaryMask;

/// Axis-aligned box in pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl PixelBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

// The brush stroke encodings Label Studio exports
#[derive(Debug, Clone, PartialEq)]
pub enum BrushEncoding {
    /// Bit-packed run-length stream of RGBA bytes (`value.rle`)
    Rle(Vec<u32>),
    /// Base64 encoded PNG bitmap
    Png(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Brush(BrushEncoding),
    Rectangle(PixelBox),
}

/// One labeled region on one image
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub task_id: String,
    /// Result id; results sharing it describe the same object
    pub region_id: Option<String>,
    pub label: Option<String>,
    pub geometry: Geometry,
}

/// One image and everything annotated on it
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub width: u32,
    pub height: u32,
    /// Source image, already resolved against the images directory
    pub image_path: Option<PathBuf>,
    /// An image was referenced by the payload but could not be found locally
    pub image_missing: bool,
    pub annotations: Vec<Annotation>,
}

/// The unit of correspondence: mask file `i` belongs to label line `i`
#[derive(Debug, Clone)]
pub struct Instance {
    pub index: usize,
    pub class_id: usize,
    pub label: String,
    /// `None` only for rectangle-only instances when masks are not written
    pub mask: Option<BinaryMask>,
    pub bbox: PixelBox,
}

// Struct to hold the paths to the output directories
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub masks_dir: PathBuf,
}

// Struct to hold processing statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub total_tasks: usize,
    pub successful_tasks: usize,
    pub background_tasks: usize,
    pub skipped_empty_tasks: usize,
    pub skipped_missing_image: usize,
    pub failed_tasks: usize,
    pub instances_written: usize,
    pub instances_skipped: usize,
    pub total_mask_area: u64,
    pub total_box_area: f64,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skipped_tasks(&self) -> usize {
        self.skipped_empty_tasks + self.skipped_missing_image
    }

    pub fn average_mask_area(&self) -> f64 {
        if self.instances_written == 0 {
            0.0
        } else {
            self.total_mask_area as f64 / self.instances_written as f64
        }
    }

    pub fn average_box_area(&self) -> f64 {
        if self.instances_written == 0 {
            0.0
        } else {
            self.total_box_area / self.instances_written as f64
        }
    }

    /// Fold another worker's counters into this one
    pub fn merge(mut self, other: ProcessingStats) -> ProcessingStats {
        self.total_tasks += other.total_tasks;
        self.successful_tasks += other.successful_tasks;
        self.background_tasks += other.background_tasks;
        self.skipped_empty_tasks += other.skipped_empty_tasks;
        self.skipped_missing_image += other.skipped_missing_image;
        self.failed_tasks += other.failed_tasks;
        self.instances_written += other.instances_written;
        self.instances_skipped += other.instances_skipped;
        self.total_mask_area += other.total_mask_area;
        self.total_box_area += other.total_box_area;
        self
    }

    pub fn print_summary(&self) {
        log::info!("=== Processing Summary ===");
        log::info!("Total tasks processed: {}", self.total_tasks);
        log::info!(
            "Successful tasks: {} (background: {})",
            self.successful_tasks,
            self.background_tasks
        );
        log::info!(
            "Skipped tasks: {} (no instances: {}, missing image: {})",
            self.skipped_tasks(),
            self.skipped_empty_tasks,
            self.skipped_missing_image
        );
        log::info!("Failed tasks: {}", self.failed_tasks);
        log::info!(
            "Instances written: {}, skipped: {}",
            self.instances_written,
            self.instances_skipped
        );
        if self.instances_written > 0 {
            log::info!("Average mask area: {:.2} pixels", self.average_mask_area());
            log::info!("Average bbox area: {:.2} pixels", self.average_box_area());
        }

        if self.failed_tasks > 0 {
            log::warn!(
                "{} task(s) failed and produced no output",
                self.failed_tasks
            );
        }
    }
}
