//! Grouping one task's annotations into ordered instances

use log::warn;
use std::fmt;

use crate::bbox::{select_box, BoxPreference};
use crate::error::{BoxError, DecodeError};
use crate::mask::{decode_mask, BinaryMask};
use crate::registry::ClassRegistry;
use crate::types::{Annotation, BrushEncoding, Geometry, Instance, PixelBox, Task};

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub box_preference: BoxPreference,
    /// Give rectangle-only instances a filled mask of their box
    pub fill_rectangle_masks: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            box_preference: BoxPreference::default(),
            fill_rectangle_masks: true,
        }
    }
}

/// Why an annotated region did not become an instance
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Decode(DecodeError),
    Box(BoxError),
    MissingLabel,
    UnknownLabel(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Decode(e) => write!(f, "{}", e),
            SkipReason::Box(e) => write!(f, "{}", e),
            SkipReason::MissingLabel => f.write_str("annotation has no label"),
            SkipReason::UnknownLabel(label) => {
                write!(f, "label '{}' is not in the label list", label)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSkip {
    /// Position of the region among the task's regions
    pub region: usize,
    pub region_id: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default)]
pub struct AggregatedTask {
    pub instances: Vec<Instance>,
    pub skipped: Vec<InstanceSkip>,
}

/// Geometry gathered for one annotated object
#[derive(Debug, Default)]
struct Region<'a> {
    region_id: Option<&'a str>,
    label: Option<&'a str>,
    brush: Option<&'a BrushEncoding>,
    rectangle: Option<PixelBox>,
}

impl<'a> Region<'a> {
    fn accepts(&self, annotation: &Annotation) -> bool {
        match (&annotation.geometry, self.region_id) {
            (_, None) => false,
            (Geometry::Brush(_), Some(id)) => {
                annotation.region_id.as_deref() == Some(id) && self.brush.is_none()
            }
            (Geometry::Rectangle(_), Some(id)) => {
                annotation.region_id.as_deref() == Some(id) && self.rectangle.is_none()
            }
        }
    }

    fn add(&mut self, annotation: &'a Annotation) {
        if self.label.is_none() {
            self.label = annotation.label.as_deref();
        }
        match &annotation.geometry {
            Geometry::Brush(encoding) => self.brush = Some(encoding),
            Geometry::Rectangle(rect) => self.rectangle = Some(*rect),
        }
    }
}

/// Merge annotations that share a region id, keeping first-appearance order
fn group_regions(annotations: &[Annotation]) -> Vec<Region<'_>> {
    let mut regions: Vec<Region<'_>> = Vec::with_capacity(annotations.len());
    for annotation in annotations {
        match regions.iter_mut().find(|region| region.accepts(annotation)) {
            Some(region) => region.add(annotation),
            None => {
                let mut region = Region {
                    region_id: annotation.region_id.as_deref(),
                    ..Region::default()
                };
                region.add(annotation);
                regions.push(region);
            }
        }
    }
    regions
}

/// Turn a task's annotations into instances numbered 0, 1, 2, ... in payload order
///
/// Regions that fail to decode, have an empty mask, or carry an unusable label are
/// skipped and reported; they never abort the rest of the task. A brush that fails to
/// decode next to a rectangle of the same region is reported while the rectangle is
/// kept.
pub fn aggregate_task(
    task: &Task,
    registry: &ClassRegistry,
    options: &AggregateOptions,
) -> AggregatedTask {
    let mut aggregated = AggregatedTask::default();

    for (position, region) in group_regions(&task.annotations).into_iter().enumerate() {
        match build_instance(&region, task, registry, options, aggregated.instances.len()) {
            Ok(Built {
                instance,
                dropped_brush,
            }) => {
                if let Some(reason) = dropped_brush {
                    record_skip(&mut aggregated.skipped, task, &region, position, reason);
                }
                aggregated.instances.push(instance);
            }
            Err(reason) => record_skip(&mut aggregated.skipped, task, &region, position, reason),
        }
    }

    aggregated
}

fn record_skip(
    skipped: &mut Vec<InstanceSkip>,
    task: &Task,
    region: &Region<'_>,
    position: usize,
    reason: SkipReason,
) {
    warn!(
        "Skipping region {} of task {}: {}",
        region.region_id.unwrap_or("<unnamed>"),
        task.id,
        reason
    );
    skipped.push(InstanceSkip {
        region: position,
        region_id: region.region_id.map(str::to_string),
        reason,
    });
}

struct Built {
    instance: Instance,
    /// Decode failure of a brush whose region still had a usable rectangle
    dropped_brush: Option<SkipReason>,
}

fn build_instance(
    region: &Region<'_>,
    task: &Task,
    registry: &ClassRegistry,
    options: &AggregateOptions,
    index: usize,
) -> Result<Built, SkipReason> {
    let label = region.label.ok_or(SkipReason::MissingLabel)?;
    let class_id = registry
        .get_or_insert(label)
        .ok_or_else(|| SkipReason::UnknownLabel(label.to_string()))?;

    let mut dropped_brush = None;
    let mask = match region
        .brush
        .map(|encoding| decode_mask(encoding, task.width, task.height))
        .transpose()
    {
        Ok(mask) => mask,
        // Only the brush is excluded; the rectangle of the same region still stands
        Err(e) if region.rectangle.is_some() => {
            dropped_brush = Some(SkipReason::Decode(e));
            None
        }
        Err(e) => return Err(SkipReason::Decode(e)),
    };

    let bbox = select_box(
        mask.as_ref(),
        region.rectangle,
        options.box_preference,
        task.width,
        task.height,
    )
    .map_err(SkipReason::Box)?;

    // Rectangle-only regions get a filled mask so mask file i exists for label line i
    let mask = match mask {
        Some(mask) if !mask.is_empty() => Some(mask),
        _ if options.fill_rectangle_masks => {
            Some(BinaryMask::from_box(task.width, task.height, &bbox))
        }
        _ => None,
    };

    Ok(Built {
        instance: Instance {
            index,
            class_id,
            label: label.to_string(),
            mask,
            bbox,
        },
        dropped_brush,
    })
}
