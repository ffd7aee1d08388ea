use log::{error, info};
use rayon::prelude::*;
use std::collections::hash_map::{Entry, HashMap};
use std::path::Path;

use crate::aggregate::AggregateOptions;
use crate::config::Args;
use crate::conversion::{process_tasks_in_parallel, ConversionContext};
use crate::error::TaskError;
use crate::io::{check_output_root, load_tasks, setup_output_directories, write_classes_file};
use crate::labelstudio::ExportedTask;
use crate::registry::ClassRegistry;
use crate::types::{ProcessingStats, Task};
use crate::utils::{create_progress_bar, task_stem};

/// Build the registry for a run: the explicit label list, or every label in the
/// export in payload order
pub fn initialize_registry(tasks: &[Task], label_list: &[String]) -> ClassRegistry {
    if !label_list.is_empty() {
        return ClassRegistry::with_labels(label_list.iter().cloned());
    }
    let registry = ClassRegistry::new();
    registry.seed_from_tasks(tasks);
    registry
}

/// Resolve exported records into tasks, keeping payload order
///
/// Records without usable dimensions, and records whose sanitized id collides with an
/// earlier task's output names, are logged and counted as failed.
pub fn resolve_tasks(
    exported: &[ExportedTask],
    images_dir: Option<&Path>,
) -> (Vec<Task>, ProcessingStats) {
    let resolved: Vec<_> = exported
        .par_iter()
        .map(|record| record.to_task(images_dir))
        .collect();

    let mut stats = ProcessingStats::new();
    let mut stems: HashMap<String, String> = HashMap::new();
    let tasks = resolved
        .into_iter()
        .filter_map(|result| {
            let checked = result.and_then(|task| match stems.entry(task_stem(&task.id)) {
                Entry::Occupied(entry) => Err(TaskError::StemCollision {
                    task_id: task.id,
                    stem: entry.key().clone(),
                    other: entry.get().clone(),
                }),
                Entry::Vacant(entry) => {
                    entry.insert(task.id.clone());
                    Ok(task)
                }
            });
            match checked {
                Ok(task) => Some(task),
                Err(e) => {
                    error!("Failed to process {}", e);
                    stats.total_tasks += 1;
                    stats.failed_tasks += 1;
                    None
                }
            }
        })
        .collect();
    (tasks, stats)
}

/// Main dataset processing pipeline
pub fn process_dataset(args: &Args) -> Result<ProcessingStats, Box<dyn std::error::Error>> {
    let exported = load_tasks(Path::new(&args.input))?;
    let images_dir = args.images_dir();
    let (tasks, resolve_stats) = resolve_tasks(&exported, images_dir.as_deref());
    drop(exported);

    let registry = initialize_registry(&tasks, &args.label_list);
    info!("Using {} classes.", registry.len());

    let output_root = args.output_dir();
    check_output_root(&output_root, Path::new(&args.input), images_dir.as_deref())?;
    let output_dirs = setup_output_directories(&output_root)?;

    let ctx = ConversionContext {
        output_dirs: &output_dirs,
        registry: &registry,
        options: AggregateOptions {
            box_preference: args.box_source,
            fill_rectangle_masks: !args.no_masks,
        },
        precision: args.precision,
        include_background: args.include_background,
        write_masks: !args.no_masks,
    };

    let pb = create_progress_bar(tasks.len() as u64, "Convert");
    let stats = process_tasks_in_parallel(&tasks, &ctx, &pb).merge(resolve_stats);
    pb.finish_with_message("Conversion complete");

    info!("Creating {} file...", crate::io::CLASSES_FILE);
    let classes_path = write_classes_file(&output_root, &registry)
        .map_err(|e| format!("Failed to write class names: {}", e))?;

    stats.print_summary();
    info!("Dataset saved to: {}", output_root.display());
    info!("- Images: {}", output_dirs.images_dir.display());
    info!("- Labels: {}", output_dirs.labels_dir.display());
    info!("- Masks: {}", output_dirs.masks_dir.display());
    info!("- Classes: {}", classes_path.display());

    Ok(stats)
}
