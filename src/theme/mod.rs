//! Narrative themes and transcript classification.
//!
//! A talk is split into up to five narrative sections (Hook, What, Why, How,
//! Ending Hook). A [`Classifier`] maps a timestamped transcript onto
//! [`ThemedSpan`]s that drive BGM selection.

mod llm;

pub use llm::{parse_spans, LlmClassifier};

use crate::error::Result;
use crate::transcription::Transcript;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One of the five narrative categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Theme {
    Hook,
    What,
    Why,
    How,
    #[serde(rename = "Ending Hook")]
    EndingHook,
}

impl Theme {
    /// All themes in narrative order.
    pub const ALL: [Theme; 5] = [
        Theme::Hook,
        Theme::What,
        Theme::Why,
        Theme::How,
        Theme::EndingHook,
    ];

    /// The label used on the wire and in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Theme::Hook => "Hook",
            Theme::What => "What",
            Theme::Why => "Why",
            Theme::How => "How",
            Theme::EndingHook => "Ending Hook",
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "hook" | "starthook" | "openinghook" => Ok(Theme::Hook),
            "what" => Ok(Theme::What),
            "why" => Ok(Theme::Why),
            "how" => Ok(Theme::How),
            "endinghook" | "endhook" | "ending" => Ok(Theme::EndingHook),
            _ => Err(format!("Unknown theme: {}", s)),
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A time range of the transcript tagged with a theme label.
///
/// The label is kept as returned by the classifier so that unrecognized
/// themes can be reported rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemedSpan {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Theme label.
    #[serde(default)]
    pub theme: String,
}

impl ThemedSpan {
    pub fn new(start: f64, end: f64, theme: impl Into<String>) -> Self {
        Self {
            start,
            end,
            theme: theme.into(),
        }
    }

    /// Start position in whole milliseconds (truncated, never negative).
    pub fn start_ms(&self) -> u64 {
        seconds_to_ms(self.start)
    }

    /// End position in whole milliseconds (truncated, never negative).
    pub fn end_ms(&self) -> u64 {
        seconds_to_ms(self.end)
    }

    /// The parsed theme, if the label is recognized.
    pub fn parsed_theme(&self) -> Option<Theme> {
        self.theme.parse().ok()
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0) as u64
    } else {
        0
    }
}

/// Trait for transcript classifiers.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Group transcript segments into themed spans.
    async fn classify(&self, transcript: &Transcript) -> Result<Vec<ThemedSpan>>;
}
