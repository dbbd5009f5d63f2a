//! Configuration settings for Undertone.

use super::prompts::Prompts;
use crate::catalog::SelectionStrategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub openai: OpenAISettings,
    pub catalog: CatalogSettings,
    pub mixing: MixingSettings,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub limits: LimitSettings,
    pub prompts: Prompts,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for temporary files (downloads, intermediate WAVs).
    pub temp_dir: String,
    /// Default output directory for the CLI.
    pub output_dir: String,
    /// Log level when no `-v` flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            temp_dir: "/tmp/undertone".to_string(),
            output_dir: "output_audio".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// OpenAI model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// Speech-to-text model.
    pub transcription_model: String,
    /// Chat model used for theme classification.
    pub classification_model: String,
    /// Sampling temperature for classification.
    pub temperature: f32,
    /// Token limit for the classification response.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            transcription_model: "whisper-1".to_string(),
            classification_model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            max_tokens: 800,
            timeout_secs: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// BGM catalog location and theme folder names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    /// Root directory holding one folder per theme.
    pub root: String,
    pub folders: ThemeFolders,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            root: "BGM".to_string(),
            folders: ThemeFolders::default(),
        }
    }
}

/// Folder name for each theme, relative to the catalog root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeFolders {
    pub hook: String,
    pub what: String,
    pub why: String,
    pub how: String,
    pub ending_hook: String,
}

impl Default for ThemeFolders {
    fn default() -> Self {
        Self {
            hook: "Start HOOK".to_string(),
            what: "WHAT".to_string(),
            // The shipped library has a trailing space on this folder.
            why: "WHY ".to_string(),
            how: "HOW".to_string(),
            ending_hook: "End HOOK".to_string(),
        }
    }
}

/// Mixing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixingSettings {
    /// Gain reduction applied to every BGM segment, in dB.
    pub bgm_volume_reduction_db: f32,
    /// Upper bound for fade-in/fade-out length.
    pub max_fade_ms: u64,
    /// Fade length is at most segment length divided by this.
    pub fade_divisor: u64,
    /// How a clip is chosen from a theme's pool.
    pub selection: SelectionStrategy,
}

impl Default for MixingSettings {
    fn default() -> Self {
        Self {
            bgm_volume_reduction_db: 35.0,
            max_fade_ms: 2000,
            fade_divisor: 4,
            selection: SelectionStrategy::Random,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; `*` allows any origin outside production.
    pub cors_origins: Vec<String>,
    /// Deployment environment name (development, production).
    pub environment: String,
    /// Hours a local result is kept in the temp directory when uploads are
    /// disabled; 0 keeps them forever.
    pub output_retention_hours: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),
            output_retention_hours: 24,
        }
    }
}

impl ServerSettings {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// How long local results are kept, if they expire at all.
    pub fn output_retention(&self) -> Option<std::time::Duration> {
        (self.output_retention_hours > 0)
            .then(|| std::time::Duration::from_secs(self.output_retention_hours * 3600))
    }
}

/// Object storage settings for processed output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Upload processed audio when credentials are available.
    pub enabled: bool,
    pub bucket: String,
    pub region: String,
    /// Key prefix for processed files.
    pub prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket: "lisa-research".to_string(),
            region: "ap-south-1".to_string(),
            prefix: "processed_audio".to_string(),
        }
    }
}

/// Input limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Maximum accepted input size in megabytes.
    pub max_file_size_mb: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self { max_file_size_mb: 100 }
    }
}

impl Settings {
    /// Load settings from the default configuration file, then apply environment overrides.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Override settings from environment variables.
    ///
    /// `lookup` returns the value of a variable, if set.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|h| !h.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(env) = lookup("ENVIRONMENT").filter(|e| !e.is_empty()) {
            self.server.environment = env;
        }
        if let Some(enabled) = lookup("ENABLE_S3_UPLOAD") {
            self.storage.enabled = enabled.trim().eq_ignore_ascii_case("true");
        }
        if let Some(bucket) = lookup("AWS_S3_BUCKET_NAME").filter(|b| !b.is_empty()) {
            self.storage.bucket = bucket;
        }
        if let Some(region) = lookup("AWS_REGION").filter(|r| !r.is_empty()) {
            self.storage.region = region;
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::UndertoneError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("undertone")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded temp directory path.
    pub fn temp_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.temp_dir)
    }

    /// Get the expanded default output directory.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Get the expanded catalog root.
    pub fn catalog_root(&self) -> PathBuf {
        Self::expand_path(&self.catalog.root)
    }

    /// Maximum accepted input size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.limits.max_file_size_mb * 1024 * 1024
    }
}
