//! Catalog command implementation.

use crate::catalog::BgmCatalog;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::theme::Theme;
use anyhow::Result;

/// Run the catalog command.
pub fn run_catalog(settings: &Settings) -> Result<()> {
    preflight::check(Operation::Catalog, settings)?;

    let root = settings.catalog_root();
    let catalog = BgmCatalog::load(&root, &settings.catalog.folders)?;

    Output::header(&format!("BGM Catalog ({} clips)", catalog.len()));
    Output::kv("Root", &root.display().to_string());

    for theme in Theme::ALL {
        let clips = catalog.clips(theme);
        println!();
        if clips.is_empty() {
            Output::warning(&format!("{}: no clips (BGM will be silent)", theme));
            continue;
        }

        Output::info(&format!("{} ({})", theme, clips.len()));
        for clip in clips {
            Output::list_item(&clip.file_name());
        }
    }

    Ok(())
}
