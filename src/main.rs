use clap::Parser;
use log::{error, info};
use std::path::Path;
use std::process::ExitCode;

use labelstudio2yolo::{process_dataset, Args};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if !Path::new(&args.input).exists() {
        error!("The specified input does not exist: {}", args.input);
        return ExitCode::FAILURE;
    }

    info!("Starting the conversion process...");

    match process_dataset(&args) {
        Ok(stats) if stats.failed_tasks > 0 => ExitCode::from(2),
        Ok(_) => {
            info!("Conversion process completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to process dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
