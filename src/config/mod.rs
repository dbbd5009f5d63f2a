//! Configuration module for Undertone.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ClassificationPrompts, Prompts};
pub use settings::{
    CatalogSettings, GeneralSettings, LimitSettings, MixingSettings, OpenAISettings,
    ServerSettings, Settings, StorageSettings, ThemeFolders,
};
