//! Doctor command - verify credentials, the BGM library and configuration.

use crate::catalog::BgmCatalog;
use crate::cli::Output;
use crate::config::Settings;
use crate::storage;
use crate::theme::Theme;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings, config_path: Option<&Path>) -> anyhow::Result<()> {
    Output::header("Undertone Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let mut checks = Vec::new();

    let sections: [(&str, Vec<CheckResult>); 4] = [
        (
            "API Configuration",
            vec![
                check_openai_api_key(),
                check_aws_credentials(settings, |k| std::env::var(k).ok()),
            ],
        ),
        ("BGM Catalog", check_catalog(settings)),
        ("Directories", check_directories(settings)),
        ("Configuration", vec![check_config_file(config_path)]),
    ];

    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    }

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Undertone.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!(
            "All checks passed with {} warning(s).",
            warnings
        ));
    } else {
        Output::success("All checks passed! Undertone is ready to use.");
    }

    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key() -> CheckResult {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Ok(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check whether processed audio can be uploaded to S3.
fn check_aws_credentials<F>(settings: &Settings, lookup: F) -> CheckResult
where
    F: Fn(&str) -> Option<String>,
{
    if !settings.storage.enabled {
        return CheckResult::warning(
            "S3 upload",
            "disabled",
            "Set ENABLE_S3_UPLOAD=true to upload processed audio",
        );
    }

    if storage::has_aws_credentials(lookup) {
        CheckResult::ok(
            "S3 upload",
            &format!("s3://{} ({})", settings.storage.bucket, settings.storage.region),
        )
    } else {
        CheckResult::warning(
            "S3 upload",
            "AWS credentials not set (results stay local)",
            "Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY",
        )
    }
}

/// Check the BGM library and each theme folder.
fn check_catalog(settings: &Settings) -> Vec<CheckResult> {
    let root = settings.catalog_root();
    if !root.is_dir() {
        return vec![CheckResult::error(
            "BGM folder",
            &format!("{} not found", root.display()),
            "Set catalog.root in the config file",
        )];
    }

    let catalog = match BgmCatalog::load(&root, &settings.catalog.folders) {
        Ok(catalog) => catalog,
        Err(e) => {
            return vec![CheckResult::error(
                "BGM folder",
                &e.to_string(),
                "Add audio files to the theme folders",
            )]
        }
    };

    let mut results = vec![CheckResult::ok(
        "BGM folder",
        &format!("{} ({} clips)", root.display(), catalog.len()),
    )];

    for theme in Theme::ALL {
        let count = catalog.clips(theme).len();
        let name = theme.to_string();
        if count == 0 {
            results.push(CheckResult::warning(
                &name,
                "no clips",
                "Sections with this theme will have no BGM",
            ));
        } else {
            results.push(CheckResult::ok(&name, &format!("{} clip(s)", count)));
        }
    }

    results
}

/// Check working directories.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    [("Temp directory", settings.temp_dir()), ("Output directory", settings.output_dir())]
        .into_iter()
        .map(|(name, dir)| {
            if dir.exists() {
                let size = dir_size(&dir)
                    .map(format_size)
                    .unwrap_or_else(|| "unknown size".to_string());
                CheckResult::ok(name, &format!("{} ({})", dir.display(), size))
            } else {
                CheckResult::warning(
                    name,
                    &format!("{} (will be created)", dir.display()),
                    "Directory will be created on first use",
                )
            }
        })
        .collect()
}

/// Check if config file exists.
fn check_config_file(config_path: Option<&Path>) -> CheckResult {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_config_path);
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: undertone config init",
        )
    }
}

/// Total size of the files directly inside `dir`.
fn dir_size(dir: &Path) -> Option<u64> {
    let total = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .map(|m| m.len())
        .sum();
    Some(total)
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
