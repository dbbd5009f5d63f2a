//! Batch command - process every audio file in a directory.

use super::process::default_output_path;
use crate::audio::{is_supported_extension, supported_formats};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::Pipeline;
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Outcome counts for a batch run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: Vec<String>,
}

/// Run the batch command.
pub async fn run_batch(
    input_dir: &str,
    output_dir: Option<String>,
    volume_reduction: Option<f32>,
    force: bool,
    settings: Settings,
) -> Result<()> {
    let input_dir = Settings::expand_path(input_dir);
    let output_dir = match output_dir {
        Some(dir) => Settings::expand_path(&dir),
        None => settings.output_dir(),
    };
    let volume = volume_reduction.unwrap_or(settings.mixing.bgm_volume_reduction_db);

    if !input_dir.is_dir() {
        bail!("Input directory not found: {}", input_dir.display());
    }

    let inputs = collect_inputs(&input_dir)?;
    if inputs.is_empty() {
        Output::warning(&format!("No audio files found in {}", input_dir.display()));
        Output::info(&format!("Supported formats: {}", supported_formats()));
        return Ok(());
    }

    preflight::check(Operation::Process, &settings)?;
    std::fs::create_dir_all(&output_dir)?;

    Output::header("Batch Processing");
    Output::kv("Input directory", &input_dir.display().to_string());
    Output::kv("Output directory", &output_dir.display().to_string());
    Output::kv("BGM reduction", &format!("{} dB", volume));
    Output::kv("Files", &inputs.len().to_string());
    println!();

    let pipeline = Pipeline::new(&settings)?;
    let progress = Output::progress_bar(inputs.len() as u64, "");
    let mut summary = BatchSummary::default();

    for input in &inputs {
        let name = file_name(input);
        progress.set_message(name.clone());

        let output = default_output_path(input, &output_dir);
        if !force && output.exists() {
            progress.println(format!("  skipped {} (output exists)", name));
            summary.skipped += 1;
            progress.inc(1);
            continue;
        }

        match pipeline.process(input, Some(&output), volume).await {
            Ok(result) => {
                progress.println(format!(
                    "  done    {} ({} segments)",
                    name,
                    result.placements.len()
                ));
                summary.processed += 1;
            }
            Err(e) => {
                warn!("Failed to process {}: {}", name, e);
                progress.println(format!("  failed  {}: {}", name, e));
                summary.failed.push(name);
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    print_summary(&summary);
    Ok(())
}

/// Supported audio files directly inside `dir`, sorted by path.
pub(crate) fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut inputs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_supported_extension(&p.to_string_lossy()))
        .collect();
    inputs.sort();
    Ok(inputs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn print_summary(summary: &BatchSummary) {
    Output::header("Summary");
    Output::kv("Processed", &summary.processed.to_string());
    Output::kv("Skipped", &summary.skipped.to_string());
    Output::kv("Failed", &summary.failed.len().to_string());

    if summary.failed.is_empty() {
        Output::success("Batch complete.");
    } else {
        for name in &summary.failed {
            Output::list_item(name);
        }
        Output::warning(&format!("{} file(s) failed.", summary.failed.len()));
    }
}
