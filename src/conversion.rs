use indicatif::ProgressBar;
use log::{debug, error};
use rayon::prelude::*;

use crate::aggregate::{aggregate_task, AggregateOptions};
use crate::error::TaskError;
use crate::io::write_task_outputs;
use crate::mask::BinaryMask;
use crate::registry::ClassRegistry;
use crate::types::{OutputDirs, ProcessingStats, Task};
use crate::yolo::format_labels;

/// Everything a worker needs to convert one task
#[derive(Debug)]
pub struct ConversionContext<'a> {
    pub output_dirs: &'a OutputDirs,
    pub registry: &'a ClassRegistry,
    pub options: AggregateOptions,
    pub precision: usize,
    pub include_background: bool,
    pub write_masks: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Converted {
        instances: usize,
        skipped_instances: usize,
        mask_area: u64,
        box_area: f64,
    },
    /// No annotations; an empty label file was written
    Background,
    /// Nothing usable was annotated; no files were written
    SkippedEmpty { skipped_instances: usize },
    SkippedMissingImage,
}

impl TaskOutcome {
    fn record(&self, stats: &mut ProcessingStats) {
        match *self {
            TaskOutcome::Converted {
                instances,
                skipped_instances,
                mask_area,
                box_area,
            } => {
                stats.successful_tasks += 1;
                stats.instances_written += instances;
                stats.instances_skipped += skipped_instances;
                stats.total_mask_area += mask_area;
                stats.total_box_area += box_area;
            }
            TaskOutcome::Background => {
                stats.successful_tasks += 1;
                stats.background_tasks += 1;
            }
            TaskOutcome::SkippedEmpty { skipped_instances } => {
                stats.skipped_empty_tasks += 1;
                stats.instances_skipped += skipped_instances;
            }
            TaskOutcome::SkippedMissingImage => stats.skipped_missing_image += 1,
        }
    }
}

/// Convert a single task and write its files
///
/// All label lines are formatted before anything is written, so a task that fails
/// leaves no partial output behind.
pub fn process_task(task: &Task, ctx: &ConversionContext<'_>) -> Result<TaskOutcome, TaskError> {
    if task.image_missing {
        return Ok(TaskOutcome::SkippedMissingImage);
    }

    let io_error = |source| TaskError::Io {
        task_id: task.id.clone(),
        source,
    };

    if task.annotations.is_empty() {
        if !ctx.include_background {
            debug!("Task {} has no annotations", task.id);
            return Ok(TaskOutcome::SkippedEmpty {
                skipped_instances: 0,
            });
        }
        write_task_outputs(ctx.output_dirs, task, &[], &[], false).map_err(io_error)?;
        return Ok(TaskOutcome::Background);
    }

    let aggregated = aggregate_task(task, ctx.registry, &ctx.options);
    if aggregated.instances.is_empty() {
        return Ok(TaskOutcome::SkippedEmpty {
            skipped_instances: aggregated.skipped.len(),
        });
    }

    let lines = format_labels(&aggregated.instances, task.width, task.height, ctx.precision)
        .map_err(|(instance, source)| TaskError::Format {
            task_id: task.id.clone(),
            instance,
            source,
        })?;

    write_task_outputs(
        ctx.output_dirs,
        task,
        &aggregated.instances,
        &lines,
        ctx.write_masks,
    )
    .map_err(io_error)?;

    Ok(TaskOutcome::Converted {
        instances: aggregated.instances.len(),
        skipped_instances: aggregated.skipped.len(),
        mask_area: aggregated
            .instances
            .iter()
            .filter_map(|i| i.mask.as_ref())
            .map(BinaryMask::area)
            .sum(),
        box_area: aggregated.instances.iter().map(|i| i.bbox.area()).sum(),
    })
}

/// Process a batch of tasks in parallel; failures are logged and counted
pub fn process_tasks_in_parallel(
    tasks: &[Task],
    ctx: &ConversionContext<'_>,
    pb: &ProgressBar,
) -> ProcessingStats {
    tasks
        .par_iter()
        .map(|task| {
            let mut stats = ProcessingStats {
                total_tasks: 1,
                ..ProcessingStats::default()
            };
            match process_task(task, ctx) {
                Ok(outcome) => outcome.record(&mut stats),
                Err(e) => {
                    error!("Failed to process {}", e);
                    stats.failed_tasks += 1;
                }
            }
            pb.inc(1);
            stats
        })
        .reduce(ProcessingStats::new, ProcessingStats::merge)
}
