//! Prompt templates for Undertone.
//!
//! Prompts can be customized inline in the config file or by placing a
//! `classification.toml` in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub classification: ClassificationPrompts,
    /// Directory for custom prompt files (overrides the templates above).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: HashMap<String, String>,
}

/// Prompts for theme classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ClassificationPrompts {
    fn default() -> Self {
        Self {
            system: "You are a transcript analysis expert. Always return valid JSON with exactly 5 theme categories: Hook, What, Why, How, Ending Hook.".to_string(),

            user: r#"You are an expert at analyzing transcripts and categorizing content into 5 specific themes. Given a list of segments with start/end times and text, group consecutive segments into these 5 categories:

1. **Hook** - Introduction, attention-grabbing content, opening statements
2. **What** - Definition, explanation of what something is, description of concepts
3. **Why** - Reasons, motivations, benefits, importance, purpose
4. **How** - Methods, processes, steps, implementation, practical application
5. **Ending Hook** - Conclusion, call-to-action, final thoughts, closing statements

Return a JSON array of groups, each with:
- start: start time in seconds
- end: end time in seconds
- theme: one of "Hook", "What", "Why", "How", "Ending Hook"

Example output:
[
  {"start": 0, "end": 30, "theme": "Hook"},
  {"start": 30, "end": 90, "theme": "What"},
  {"start": 90, "end": 150, "theme": "Why"},
  {"start": 150, "end": 200, "theme": "How"},
  {"start": 200, "end": 220, "theme": "Ending Hook"}
]

Segments:
{{segments}}

Return only the JSON array with the 5 themes."#.to_string(),
        }
    }
}

impl Prompts {
    /// Apply the custom prompt directory, if one is configured.
    pub fn resolve(&self) -> crate::error::Result<Self> {
        let mut prompts = self.clone();

        if let Some(dir) = &self.custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let classification_path = custom_path.join("classification.toml");
            if classification_path.exists() {
                let content = std::fs::read_to_string(&classification_path)?;
                prompts.classification = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
