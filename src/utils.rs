use indicatif::{ProgressBar, ProgressStyle};
use log::error;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::BufReader;
use std::path::Path;

/// Read and parse a JSON file straight from a buffered file stream
pub fn read_and_parse_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to open JSON file ({}): {:?}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_reader(BufReader::new(file)) {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Failed to parse JSON ({}): {:?}", path.display(), e);
            None
        }
    }
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Safely create an output directory, replacing any previous one
pub fn create_output_directory(path: &Path) -> std::io::Result<std::path::PathBuf> {
    if path.exists() {
        log::warn!(
            "Directory {:?} already exists. Deleting and recreating it.",
            path
        );
        fs::remove_dir_all(path).and_then(|_| fs::create_dir_all(path))?;
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// File-name-safe stem for a task id
pub fn task_stem(task_id: &str) -> String {
    let sanitized = sanitize_filename::sanitize(task_id);
    if sanitized.is_empty() {
        "task".to_string()
    } else {
        sanitized
    }
}
