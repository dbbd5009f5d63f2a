//! Read-only catalog of themed BGM clips.
//!
//! The library lives on disk as one folder per theme under a common root:
//!
//! ```text
//! BGM/
//!   Start HOOK/   -> Hook
//!   WHAT/         -> What
//!   WHY /         -> Why
//!   HOW/          -> How
//!   End HOOK/     -> Ending Hook
//! ```
//!
//! The catalog is loaded once and shared read-only afterwards.

use crate::audio::{is_supported_extension, probe_file};
use crate::config::ThemeFolders;
use crate::error::{Result, UndertoneError};
use crate::theme::Theme;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A single BGM clip on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgmClip {
    pub theme: Theme,
    pub path: PathBuf,
}

impl BgmClip {
    pub fn new(theme: Theme, path: impl Into<PathBuf>) -> Self {
        Self {
            theme,
            path: path.into(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// How a clip is chosen from a theme's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Uniform random choice for every span.
    #[default]
    Random,
    /// Span index modulo pool size.
    RoundRobin,
}

impl SelectionStrategy {
    /// Pick a clip for the `index`-th span.
    pub fn pick<'a, R: Rng + ?Sized>(
        &self,
        pool: &'a [BgmClip],
        index: usize,
        rng: &mut R,
    ) -> Option<&'a BgmClip> {
        if pool.is_empty() {
            return None;
        }
        match self {
            SelectionStrategy::Random => pool.get(rng.gen_range(0..pool.len())),
            SelectionStrategy::RoundRobin => pool.get(index % pool.len()),
        }
    }
}

impl std::str::FromStr for SelectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "random" => Ok(SelectionStrategy::Random),
            "round_robin" | "cycle" => Ok(SelectionStrategy::RoundRobin),
            _ => Err(format!("Unknown selection strategy: {}", s)),
        }
    }
}

impl std::fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionStrategy::Random => write!(f, "random"),
            SelectionStrategy::RoundRobin => write!(f, "round-robin"),
        }
    }
}

/// Themed BGM clips, keyed by theme in narrative order.
#[derive(Debug, Clone, Default)]
pub struct BgmCatalog {
    clips: BTreeMap<Theme, Vec<BgmClip>>,
}

impl BgmCatalog {
    /// Build a catalog from an explicit list of clips.
    pub fn from_clips(clips: impl IntoIterator<Item = BgmClip>) -> Self {
        let mut map: BTreeMap<Theme, Vec<BgmClip>> = BTreeMap::new();
        for clip in clips {
            map.entry(clip.theme).or_default().push(clip);
        }
        Self { clips: map }
    }

    /// Load the catalog from `root` using the configured folder names.
    ///
    /// Empty or unreadable files are skipped with a warning. Fails when the
    /// root is missing or no theme ends up with any usable clip.
    pub fn load(root: &Path, folders: &ThemeFolders) -> Result<Self> {
        if !root.is_dir() {
            return Err(UndertoneError::Catalog(format!(
                "BGM folder '{}' not found",
                root.display()
            )));
        }

        let mut clips: BTreeMap<Theme, Vec<BgmClip>> = BTreeMap::new();

        for theme in Theme::ALL {
            let folder_name = folder_for(folders, theme);
            let Some(folder) = resolve_folder(root, folder_name) else {
                warn!("Theme folder not found: '{}'", folder_name);
                continue;
            };

            let pool = load_folder(&folder, theme)?;
            if pool.is_empty() {
                warn!("No valid audio files found in theme folder: '{}'", folder_name);
                continue;
            }

            info!("Loaded {} files for theme '{}'", pool.len(), theme);
            clips.insert(theme, pool);
        }

        if clips.is_empty() {
            return Err(UndertoneError::Catalog(format!(
                "No valid themed BGM audio files found under '{}'",
                root.display()
            )));
        }

        Ok(Self { clips })
    }

    /// Clips available for `theme` (empty if none).
    pub fn clips(&self, theme: Theme) -> &[BgmClip] {
        self.clips.get(&theme).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.clips.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `"<Theme>: <file name>"` for every clip, in theme order.
    pub fn list(&self) -> Vec<String> {
        self.clips
            .iter()
            .flat_map(|(theme, pool)| {
                pool.iter()
                    .map(move |clip| format!("{}: {}", theme, clip.file_name()))
            })
            .collect()
    }
}

fn folder_for(folders: &ThemeFolders, theme: Theme) -> &str {
    match theme {
        Theme::Hook => &folders.hook,
        Theme::What => &folders.what,
        Theme::Why => &folders.why,
        Theme::How => &folders.how,
        Theme::EndingHook => &folders.ending_hook,
    }
}

/// Exact folder name first, then a trimmed case-insensitive match.
fn resolve_folder(root: &Path, name: &str) -> Option<PathBuf> {
    let exact = root.join(name);
    if exact.is_dir() {
        return Some(exact);
    }

    let wanted = name.trim().to_lowercase();
    std::fs::read_dir(root)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().trim().to_lowercase() == wanted)
                .unwrap_or(false)
        })
}

fn load_folder(folder: &Path, theme: Theme) -> Result<Vec<BgmClip>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_supported_extension(&p.to_string_lossy()))
        .collect();
    paths.sort();

    let mut pool = Vec::with_capacity(paths.len());
    for path in paths {
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            warn!("Skipping empty audio file: {}", path.display());
            continue;
        }

        if let Err(e) = probe_file(&path) {
            warn!("Skipping invalid audio file: {} ({})", path.display(), e);
            continue;
        }

        debug!("Loaded theme '{}' file: {}", theme, path.display());
        pool.push(BgmClip::new(theme, path));
    }

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{write_wav, AudioBuffer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn write_clip(path: &Path) {
        write_wav(path, &AudioBuffer::silent(50, 8000, 1)).unwrap();
    }

    fn library() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        for folder in ["Start HOOK", "WHAT", "WHY ", "End HOOK"] {
            std::fs::create_dir_all(root.join(folder)).unwrap();
        }
        write_clip(&root.join("Start HOOK/b.wav"));
        write_clip(&root.join("Start HOOK/a.wav"));
        write_clip(&root.join("WHAT/what.wav"));
        write_clip(&root.join("WHY /why.wav"));
        std::fs::write(root.join("WHY /notes.txt"), "not audio").unwrap();
        std::fs::write(root.join("End HOOK/empty.mp3"), b"").unwrap();
        std::fs::write(root.join("End HOOK/broken.wav"), b"garbage").unwrap();

        dir
    }

    #[test]
    fn test_load_library() {
        let dir = library();
        let catalog = BgmCatalog::load(dir.path(), &ThemeFolders::default()).unwrap();

        assert_eq!(catalog.clips(Theme::Hook).len(), 2);
        assert_eq!(catalog.clips(Theme::What).len(), 1);
        assert_eq!(catalog.clips(Theme::Why).len(), 1);
        // HOW folder missing, End HOOK only has unusable files
        assert!(catalog.clips(Theme::How).is_empty());
        assert!(catalog.clips(Theme::EndingHook).is_empty());
        assert_eq!(catalog.len(), 4);

        assert_eq!(
            catalog.list(),
            vec!["Hook: a.wav", "Hook: b.wav", "What: what.wav", "Why: why.wav"]
        );
    }

    #[test]
    fn test_folder_name_fallback_is_trimmed_and_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("why")).unwrap();
        write_clip(&dir.path().join("why/clip.wav"));

        let catalog = BgmCatalog::load(dir.path(), &ThemeFolders::default()).unwrap();
        assert_eq!(catalog.clips(Theme::Why).len(), 1);
    }

    #[test]
    fn test_missing_root() {
        let err = BgmCatalog::load(Path::new("/nonexistent/bgm"), &ThemeFolders::default())
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_no_usable_clips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("WHAT")).unwrap();
        std::fs::write(dir.path().join("WHAT/empty.wav"), b"").unwrap();

        let err = BgmCatalog::load(dir.path(), &ThemeFolders::default()).unwrap_err();
        assert!(err.to_string().contains("No valid themed BGM"));
    }

    #[test]
    fn test_round_robin_selection() {
        let pool = vec![
            BgmClip::new(Theme::How, "a.wav"),
            BgmClip::new(Theme::How, "b.wav"),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let strategy = SelectionStrategy::RoundRobin;

        let picks: Vec<String> = (0..4)
            .map(|i| strategy.pick(&pool, i, &mut rng).unwrap().file_name())
            .collect();
        assert_eq!(picks, vec!["a.wav", "b.wav", "a.wav", "b.wav"]);
    }

    #[test]
    fn test_random_selection_stays_in_pool() {
        let pool = vec![
            BgmClip::new(Theme::Hook, "a.wav"),
            BgmClip::new(Theme::Hook, "b.wav"),
            BgmClip::new(Theme::Hook, "c.wav"),
        ];
        let mut rng = StdRng::seed_from_u64(42);

        for i in 0..20 {
            let clip = SelectionStrategy::Random.pick(&pool, i, &mut rng).unwrap();
            assert!(pool.contains(clip));
        }
        assert!(SelectionStrategy::Random.pick(&[], 0, &mut rng).is_none());
        assert!(SelectionStrategy::RoundRobin.pick(&[], 0, &mut rng).is_none());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("random".parse::<SelectionStrategy>().unwrap(), SelectionStrategy::Random);
        assert_eq!(
            "round-robin".parse::<SelectionStrategy>().unwrap(),
            SelectionStrategy::RoundRobin
        );
        assert!("shuffle".parse::<SelectionStrategy>().is_err());
    }
}
