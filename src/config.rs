use clap::Parser;
use std::path::{Path, PathBuf};

use crate::bbox::BoxPreference;
use crate::yolo::DEFAULT_PRECISION;

/// Command-line arguments for converting a Label Studio export to YOLO format.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    /// Label Studio JSON export file, or an export directory with
    /// image_annotation_pairs.json, annotations/ and images/
    #[arg(short = 'i', long = "input")]
    pub input: String,

    /// Output directory (defaults to YOLODataset next to the input)
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Directory holding the task images (defaults to <input>/images for export directories)
    #[arg(long = "images_dir")]
    pub images_dir: Option<String>,

    /// Box source used when a region has both a rectangle and a brush mask
    #[arg(long = "box_source", value_enum, default_value = "rectangle")]
    pub box_source: BoxPreference,

    /// Number of decimals written for normalized coordinates
    #[arg(long = "precision", default_value_t = DEFAULT_PRECISION, value_parser = validate_precision)]
    pub precision: usize,

    /// Write an empty label file for tasks without annotations
    #[arg(long = "include_background")]
    pub include_background: bool,

    /// Do not write per-instance mask files
    #[arg(long = "no_masks")]
    pub no_masks: bool,

    /// Ordered list of labels; other labels are ignored
    #[arg(use_value_delimiter = true)]
    pub label_list: Vec<String>,
}

impl Args {
    /// Output root, `YOLODataset` beside (or inside, for a directory) the input
    pub fn output_dir(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return PathBuf::from(output);
        }
        let input = Path::new(&self.input);
        if input.is_dir() {
            input.join("YOLODataset")
        } else {
            input
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("YOLODataset")
        }
    }

    /// Images directory, explicit or implied by an export directory
    pub fn images_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.images_dir {
            return Some(PathBuf::from(dir));
        }
        let input = Path::new(&self.input);
        let implied = input.join("images");
        (input.is_dir() && implied.is_dir()).then_some(implied)
    }
}

// Validate that the precision produces meaningful coordinates
fn validate_precision(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(val) if (1..=12).contains(&val) => Ok(val),
        _ => Err("PRECISION must be between 1 and 12".to_string()),
    }
}
