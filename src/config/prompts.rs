//! Prompt templates and per-selector tone data.
//!
//! Tone files are JSON documents describing an agent's purpose, role and
//! session structure. They shape the system preamble sent with every
//! retrieval-grounded answer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Preamble used when a selector has no tone data.
pub const GENERIC_PREAMBLE: &str = "You are a helpful AI assistant.";

const DEFAULT_PURPOSE: &str = "Guide the user effectively.";
const DEFAULT_ROLE: &str = "An AI coach providing structured guidance.";

/// Template for the user message when a context chunk was retrieved.
pub const GROUNDED_USER_TEMPLATE: &str =
    "Reference material:\n{{context}}\n\nQuestion: {{question}}";

/// One entry of a tone file's session structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionStep {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Tone settings for a selector.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToneData {
    pub purpose: Option<String>,
    pub role: Option<String>,
    pub coaching_session_structure: Vec<SessionStep>,
}

impl ToneData {
    /// Load tone data from a JSON file.
    ///
    /// Returns `None` when the file is missing or unreadable; the caller falls
    /// back to [`GENERIC_PREAMBLE`].
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to read tone file {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(tone) => Some(tone),
            Err(e) => {
                warn!("Ignoring malformed tone file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Titles of the session steps, skipping untitled entries.
    pub fn step_titles(&self) -> Vec<&str> {
        self.coaching_session_structure
            .iter()
            .filter_map(|s| s.title.as_deref())
            .collect()
    }
}

/// Build the system preamble from optional tone data.
pub fn build_system_message(tone: Option<&ToneData>) -> String {
    let Some(tone) = tone else {
        return GENERIC_PREAMBLE.to_string();
    };

    let objective = tone.purpose.as_deref().unwrap_or(DEFAULT_PURPOSE);
    let role = tone.role.as_deref().unwrap_or(DEFAULT_ROLE);

    let mut message = format!(
        "Objective: {}. Role: {}. Use an interactive coaching style. \
         Provide responses in three key points with examples when relevant. \
         Encourage engagement by asking a thought-provoking question at the end.",
        objective.trim_end_matches('.'),
        role.trim_end_matches('.')
    );

    let steps = tone.step_titles();
    if !steps.is_empty() {
        message.push_str(" Session Steps: ");
        message.push_str(&steps.join(", "));
        message.push('.');
    }

    message
}

/// Render a `{{name}}` template with the given variables.
///
/// Placeholders are resolved in a single left-to-right pass, so substituted
/// values are never scanned again. Unknown placeholders are kept verbatim.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            rest = &rest[start..];
            break;
        };

        let name = &after_open[..end];
        match vars.get(name) {
            Some(value) => result.push_str(value),
            None => {
                result.push_str("{{");
                result.push_str(name);
                result.push_str("}}");
            }
        }
        rest = &after_open[end + 2..];
    }

    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_preamble_without_tone() {
        assert_eq!(build_system_message(None), GENERIC_PREAMBLE);
    }

    #[test]
    fn test_system_message_from_tone() {
        let tone: ToneData = serde_json::from_str(
            r#"{
                "purpose": "Sharpen negotiation skills",
                "role": "A sales trainer",
                "coaching_session_structure": [
                    {"title": "Warm-up"},
                    {"description": "no title here"},
                    {"title": "Role play"}
                ]
            }"#,
        )
        .unwrap();

        let message = build_system_message(Some(&tone));
        assert!(message
            .starts_with("Objective: Sharpen negotiation skills. Role: A sales trainer."));
        assert!(message.ends_with("Session Steps: Warm-up, Role play."));
    }

    #[test]
    fn test_partial_tone_uses_defaults() {
        let tone = ToneData::default();
        let message = build_system_message(Some(&tone));
        assert!(message.contains("Guide the user effectively"));
        assert!(!message.contains("Session Steps"));
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ToneData::load(&dir.path().join("absent.json")).is_none());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(ToneData::load(&bad).is_none());
    }

    #[test]
    fn test_render_template() {
        let mut vars = HashMap::new();
        vars.insert("context", "The sky is blue.");
        vars.insert("question", "What color is the sky?");

        let result = render(GROUNDED_USER_TEMPLATE, &vars);
        assert_eq!(
            result,
            "Reference material:\nThe sky is blue.\n\nQuestion: What color is the sky?"
        );
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        // Each map gets its own hash seed, so iteration order varies between rounds.
        for _ in 0..8 {
            let mut vars = HashMap::new();
            vars.insert("context", "Templates look like {{question}} or {{context}}.");
            vars.insert("question", "How do I write a template?");
            assert_eq!(
                render(GROUNDED_USER_TEMPLATE, &vars),
                "Reference material:\nTemplates look like {{question}} or {{context}}.\n\n\
                 Question: How do I write a template?"
            );
        }
    }

    #[test]
    fn test_render_keeps_unknown_and_unclosed_placeholders() {
        let vars = HashMap::from([("name", "Joel")]);
        assert_eq!(render("Hi {{name}}, {{other}} {{", &vars), "Hi Joel, {{other}} {{");
    }
}
