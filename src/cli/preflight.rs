//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration and files are available
//! before starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{Result, UndertoneError};
use crate::openai;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Processing requires the API key and the BGM catalog.
    Process,
    /// Listing only requires the BGM catalog.
    Catalog,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Process => {
            check_api_key()?;
            check_catalog_root(settings)?;
        }
        Operation::Catalog => {
            check_catalog_root(settings)?;
        }
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    if openai::is_api_key_configured() {
        Ok(())
    } else {
        Err(UndertoneError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        ))
    }
}

/// Check that the BGM library root exists.
fn check_catalog_root(settings: &Settings) -> Result<()> {
    let root = settings.catalog_root();
    if root.is_dir() {
        Ok(())
    } else {
        Err(UndertoneError::Catalog(format!(
            "BGM folder '{}' not found. Set catalog.root in the config file.",
            root.display()
        )))
    }
}
