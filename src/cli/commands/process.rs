//! Process command - add themed BGM to a single file.

use crate::catalog::SelectionStrategy;
use crate::cli::output::format_duration;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{Pipeline, ProcessResult};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Run the process command.
pub async fn run_process(
    input: &str,
    output: Option<String>,
    volume_reduction: Option<f32>,
    selection: Option<SelectionStrategy>,
    mut settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Process, &settings)?;

    let input_path = Settings::expand_path(input);
    if !input_path.is_file() {
        bail!("Input file not found: {}", input_path.display());
    }

    let output_path = match output {
        Some(path) => Settings::expand_path(&path),
        None => default_output_path(&input_path, &settings.output_dir()),
    };

    if let Some(selection) = selection {
        settings.mixing.selection = selection;
    }
    let volume = volume_reduction.unwrap_or(settings.mixing.bgm_volume_reduction_db);

    Output::header("Undertone");
    Output::kv("Input", &input_path.display().to_string());
    Output::kv("Output", &output_path.display().to_string());
    Output::kv("BGM reduction", &format!("{} dB", volume));
    Output::kv("Selection", &settings.mixing.selection.to_string());
    println!();

    let pipeline = Pipeline::new(&settings)?;

    let spinner = Output::spinner("Transcribing, classifying and mixing...");
    let result = pipeline.process(&input_path, Some(&output_path), volume).await;
    spinner.finish_and_clear();

    let result = result?;
    print_result(&result);

    Ok(())
}

/// `<output_dir>/<stem>_with_bgm.wav`
pub(crate) fn default_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    output_dir.join(format!("{}_with_bgm.wav", stem))
}

pub(crate) fn print_result(result: &ProcessResult) {
    Output::header("Placements");
    if result.placements.is_empty() {
        Output::warning("No themed sections detected; output has no BGM.");
    }
    for placement in &result.placements {
        Output::placement(placement);
    }
    println!();
    Output::success(&format!(
        "Saved {} ({})",
        result.output_path.display(),
        format_duration(result.duration_ms as f64 / 1000.0)
    ));
}
