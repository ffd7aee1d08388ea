use glob::glob;
use image::ImageFormat;
use log::{info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::{self, copy, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::labelstudio::ExportedTask;
use crate::registry::ClassRegistry;
use crate::types::{Instance, OutputDirs, Task};
use crate::utils::{create_output_directory, read_and_parse_json, task_stem};

/// Mapping file written by the upstream exporter next to annotations/ and images/
pub const PAIRS_MAPPING_FILE: &str = "image_annotation_pairs.json";
pub const CLASSES_FILE: &str = "classes.txt";

#[derive(Debug, Clone, Deserialize)]
pub struct PairInfo {
    pub image_file: String,
    pub annotation_file: String,
}

// A JSON export is an array of tasks, a hand-made payload may be a single task
#[derive(Deserialize)]
#[serde(untagged)]
enum ExportPayload {
    Many(Vec<ExportedTask>),
    One(Box<ExportedTask>),
}

/// Load every task of a JSON export file or an export directory
pub fn load_tasks(input: &Path) -> Result<Vec<ExportedTask>, Box<dyn std::error::Error>> {
    let tasks = if input.is_file() {
        match read_and_parse_json::<ExportPayload>(input) {
            Some(ExportPayload::Many(tasks)) => tasks,
            Some(ExportPayload::One(task)) => vec![*task],
            None => return Err(format!("Invalid export file: {}", input.display()).into()),
        }
    } else if input.join(PAIRS_MAPPING_FILE).is_file() {
        load_export_directory(input)?
    } else if input.is_dir() {
        load_annotation_files(input)?
    } else {
        return Err(format!("Input not found: {}", input.display()).into());
    };

    if tasks.is_empty() {
        return Err("No valid annotation files found!".into());
    }
    info!("Loaded {} tasks from {}", tasks.len(), input.display());
    Ok(tasks)
}

fn load_export_directory(dir: &Path) -> Result<Vec<ExportedTask>, Box<dyn std::error::Error>> {
    let mapping_path = dir.join(PAIRS_MAPPING_FILE);
    let mapping: BTreeMap<String, PairInfo> = read_and_parse_json(&mapping_path)
        .ok_or_else(|| format!("Invalid mapping file: {}", mapping_path.display()))?;

    // Numeric task ids sort numerically, the rest lexically after them
    let mut entries: Vec<_> = mapping.into_iter().collect();
    entries.sort_by_key(|(id, _)| (id.parse::<i64>().map_err(|_| id.clone()), id.clone()));

    let annotations_dir = dir.join("annotations");
    let tasks = entries
        .into_iter()
        .filter_map(|(task_id, info)| {
            let path = annotations_dir.join(&info.annotation_file);
            if !path.is_file() {
                warn!("Annotation file not found for task {}: {}", task_id, path.display());
                return None;
            }
            let mut task: ExportedTask = read_and_parse_json(&path)?;
            task.file_upload = Some(info.image_file);
            Some(task)
        })
        .collect();
    Ok(tasks)
}

fn load_annotation_files(dir: &Path) -> Result<Vec<ExportedTask>, Box<dyn std::error::Error>> {
    let pattern = format!("{}/annotations/*.json", dir.display());
    let tasks = glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| read_and_parse_json::<ExportedTask>(&path))
        .collect();
    Ok(tasks)
}

/// Reject an output root that equals or contains the input or the source images
///
/// `setup_output_directories` recreates `images/`, `labels/` and `masks/` under the
/// root, which would delete the export being converted.
pub fn check_output_root(
    output_root: &Path,
    input: &Path,
    images_dir: Option<&Path>,
) -> Result<(), String> {
    let Ok(root) = fs::canonicalize(output_root) else {
        // A root that does not exist yet cannot contain anything
        return Ok(());
    };

    for protected in std::iter::once(input).chain(images_dir) {
        if let Ok(path) = fs::canonicalize(protected) {
            if path.starts_with(&root) {
                return Err(format!(
                    "Output directory {} would overwrite the input {}; choose another output",
                    output_root.display(),
                    protected.display()
                ));
            }
        }
    }
    Ok(())
}

/// Set up the directory structure for the dataset output
pub fn setup_output_directories(root: &Path) -> std::io::Result<OutputDirs> {
    fs::create_dir_all(root)?;
    Ok(OutputDirs {
        root: root.to_path_buf(),
        images_dir: create_output_directory(&root.join("images"))?,
        labels_dir: create_output_directory(&root.join("labels"))?,
        masks_dir: create_output_directory(&root.join("masks"))?,
    })
}

/// Path of the mask file for instance `index` of a task
pub fn mask_path(output_dirs: &OutputDirs, task_id: &str, index: usize) -> PathBuf {
    output_dirs
        .masks_dir
        .join(format!("{}_{}.png", task_stem(task_id), index))
}

pub fn label_path(output_dirs: &OutputDirs, task_id: &str) -> PathBuf {
    output_dirs
        .labels_dir
        .join(format!("{}.txt", task_stem(task_id)))
}

/// Write one task's image, masks and label file
///
/// The label file is written last so its presence marks a complete task.
pub fn write_task_outputs(
    output_dirs: &OutputDirs,
    task: &Task,
    instances: &[Instance],
    label_lines: &[String],
    write_masks: bool,
) -> std::io::Result<()> {
    if let Some(image_path) = &task.image_path {
        let mut file_name = task_stem(&task.id);
        if let Some(extension) = image_path.extension().and_then(|e| e.to_str()) {
            file_name = format!("{}.{}", file_name, extension);
        }
        copy(image_path, output_dirs.images_dir.join(file_name))?;
    }

    if write_masks {
        for (instance, mask) in instances
            .iter()
            .filter_map(|i| i.mask.as_ref().map(|mask| (i, mask)))
        {
            let path = mask_path(output_dirs, &task.id, instance.index);
            mask.to_image()
                .save_with_format(path, ImageFormat::Png)
                .map_err(std::io::Error::other)?;
        }
    }

    let mut writer = BufWriter::new(File::create(label_path(output_dirs, &task.id))?);
    for line in label_lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Write `classes.txt`: one class name per line, line number = class id
pub fn write_classes_file(root: &Path, registry: &ClassRegistry) -> std::io::Result<PathBuf> {
    let path = root.join(CLASSES_FILE);
    let mut writer = BufWriter::new(File::create(&path)?);
    for name in registry.names() {
        writeln!(writer, "{}", name)?;
    }
    writer.flush()?;
    Ok(path)
}
