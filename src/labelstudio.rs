//! Label Studio JSON export records
//!
//! Only the fields the converter needs are modeled; everything else in the export is
//! ignored by serde.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::TaskError;
use crate::types::{Annotation, BrushEncoding, Geometry, PixelBox, Task};

pub const BRUSH_LABELS: &str = "brushlabels";
pub const RECTANGLE_LABELS: &str = "rectanglelabels";

// Task ids are integers in exports but strings in hand-made payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskId {
    Int(i64),
    Str(String),
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Int(id) => write!(f, "{}", id),
            TaskId::Str(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultValue {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub rle: Option<Vec<u32>>,
    /// Base64 PNG bitmap, used by some brush exports instead of `rle`
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub rotation: Option<f64>,
    #[serde(default)]
    pub brushlabels: Option<Vec<String>>,
    #[serde(default)]
    pub rectanglelabels: Option<Vec<String>>,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
}

impl ResultValue {
    pub fn label(&self) -> Option<&str> {
        [&self.brushlabels, &self.rectanglelabels, &self.labels]
            .into_iter()
            .flatten()
            .find_map(|labels| labels.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub original_width: Option<u32>,
    #[serde(default)]
    pub original_height: Option<u32>,
    #[serde(default)]
    pub value: ResultValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportedAnnotation {
    #[serde(default)]
    pub was_cancelled: Option<bool>,
    #[serde(default)]
    pub result: Vec<AnnotationResult>,
}

impl ExportedAnnotation {
    pub fn is_active(&self) -> bool {
        !self.was_cancelled.unwrap_or(false)
    }
}

/// One task of a Label Studio export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedTask {
    pub id: TaskId,
    #[serde(default)]
    pub data: TaskData,
    #[serde(default)]
    pub annotations: Vec<ExportedAnnotation>,
    #[serde(default)]
    pub file_upload: Option<String>,
}

impl ExportedTask {
    fn active_results(&self) -> impl Iterator<Item = &AnnotationResult> {
        self.annotations
            .iter()
            .filter(|annotation| annotation.is_active())
            .flat_map(|annotation| annotation.result.iter())
    }

    /// Pixel dimensions recorded by the annotation tool
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.active_results()
            .find_map(|result| match (result.original_width, result.original_height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
                _ => None,
            })
    }

    /// File name of the task image: the uploaded file name, else the last URL segment
    pub fn image_name(&self) -> Option<String> {
        if let Some(upload) = self.file_upload.as_deref().filter(|u| !u.is_empty()) {
            return Some(upload.to_string());
        }
        let url = self.data.image.as_deref()?;
        let path = url.split(['?', '#']).next().unwrap_or(url);
        path.rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Resolve the core task model
    ///
    /// Dimensions come from the payload, else from the image file; a task with neither
    /// fails before any output is written.
    pub fn to_task(&self, images_dir: Option<&Path>) -> Result<Task, TaskError> {
        let id = self.id.to_string();

        let mut image_missing = false;
        let image_path = match (images_dir, self.image_name()) {
            (Some(dir), Some(name)) => {
                let path = dir.join(&name);
                if path.is_file() {
                    Some(path)
                } else {
                    warn!("Image not found for task {}: {}", id, path.display());
                    image_missing = true;
                    None
                }
            }
            _ => None,
        };

        let (width, height) = self
            .dimensions()
            .or_else(|| {
                image_path
                    .as_deref()
                    .and_then(|path| image::image_dimensions(path).ok())
            })
            .ok_or_else(|| TaskError::MissingDimensions {
                task_id: id.clone(),
            })?;

        let annotations = self
            .active_results()
            .filter_map(|result| result_to_annotation(&id, result, width, height))
            .collect();

        Ok(Task {
            id,
            width,
            height,
            image_path,
            image_missing,
            annotations,
        })
    }
}

fn result_to_annotation(
    task_id: &str,
    result: &AnnotationResult,
    width: u32,
    height: u32,
) -> Option<Annotation> {
    let value = &result.value;
    let geometry = match result.kind.as_str() {
        BRUSH_LABELS => {
            let encoding = match (&value.rle, &value.mask) {
                (Some(rle), _) => BrushEncoding::Rle(rle.clone()),
                (None, Some(mask)) => BrushEncoding::Png(mask.clone()),
                // Decodes to an empty mask, which the aggregator reports
                (None, None) => BrushEncoding::Rle(Vec::new()),
            };
            if let Some(format) = value.format.as_deref().filter(|f| *f != "rle") {
                debug!("Task {}: brush format '{}' treated as rle", task_id, format);
            }
            Geometry::Brush(encoding)
        }
        RECTANGLE_LABELS => match (value.x, value.y, value.width, value.height) {
            (Some(x), Some(y), Some(w), Some(h)) => Geometry::Rectangle(rectangle_to_pixels(
                x,
                y,
                w,
                h,
                value.rotation.unwrap_or(0.0),
                width,
                height,
            )),
            _ => {
                warn!(
                    "Task {}: rectangle {} has incomplete coordinates",
                    task_id,
                    result.id.as_deref().unwrap_or("<unnamed>")
                );
                return None;
            }
        },
        other => {
            debug!("Task {}: ignoring result of type '{}'", task_id, other);
            return None;
        }
    };

    Some(Annotation {
        task_id: task_id.to_string(),
        region_id: result.id.clone(),
        label: value.label().map(str::to_string),
        geometry,
    })
}

/// Convert a rectangle given in percent of the image into a pixel box
///
/// Label Studio rotates rectangles around their top-left corner; the result is the
/// axis-aligned hull of the rotated corners.
pub fn rectangle_to_pixels(
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    rotation: f64,
    image_width: u32,
    image_height: u32,
) -> PixelBox {
    let sx = image_width as f64 / 100.0;
    let sy = image_height as f64 / 100.0;
    let (x0, y0) = (x * sx, y * sy);
    let (w, h) = (width * sx, height * sy);

    if rotation == 0.0 {
        return PixelBox::new(x0, y0, x0 + w, y0 + h);
    }

    let (sin, cos) = rotation.to_radians().sin_cos();
    let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)].map(|(dx, dy)| {
        (x0 + dx * cos - dy * sin, y0 + dx * sin + dy * cos)
    });
    corners.iter().fold(
        PixelBox::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN),
        |acc, &(cx, cy)| {
            PixelBox::new(
                acc.xmin.min(cx),
                acc.ymin.min(cy),
                acc.xmax.max(cx),
                acc.ymax.max(cy),
            )
        },
    )
}
