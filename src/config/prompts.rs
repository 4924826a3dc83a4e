//! Prompt templates for Referat.
//!
//! Prompts can be customized by placing a `summary.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Version tag of the built-in summary templates.
pub const SUMMARY_PROMPT_VERSION: &str = "2";

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub summary: SummaryPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for map-reduce summarization.
///
/// `section` summarizes one chunk of raw transcript, `direct` summarizes a
/// transcript that fits in a single chunk, and `combined` merges the section
/// summaries into the final document. Each template receives `{{text}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryPrompts {
    pub version: String,
    pub section: String,
    pub direct: String,
    pub combined: String,
}

impl Default for SummaryPrompts {
    fn default() -> Self {
        Self {
            version: SUMMARY_PROMPT_VERSION.to_string(),

            section: r#"You are a helpful assistant. Your task is to summarize the following section of a lecture transcript. Focus on extracting the key points, definitions, and strategies discussed in this specific part.

Transcript Section:
"""
{{text}}
"""

Provide a concise summary of this section:"#
                .to_string(),

            direct: r#"You are an expert analyst and educator. Your task is to create a comprehensive, detailed summary of a lecture transcript. The summary must be well-structured, easy to read, and highlight all key concepts, definitions, strategies, and examples mentioned. Use markdown for formatting, such as headings, bullet points, and bold text, to improve readability.

Now, based on the principles above, create a comprehensive summary of the following text:

Source Text:
"""
{{text}}
"""

Comprehensive Summary:"#
                .to_string(),

            combined: r#"You are an expert analyst and educator. Your task is to create a comprehensive, detailed summary of a collection of summaries from different parts of a lecture. The section summaries are given in lecture order and separated by "---". Merge them into one coherent document: remove repetition between sections, keep every distinct concept, definition, strategy, and example, and preserve the order in which topics were introduced. Use markdown for formatting, such as headings, bullet points, and bold text, to improve readability.

Now, based on the principles above, create a comprehensive summary of the following section summaries:

Section Summaries:
"""
{{text}}
"""

Comprehensive Summary:"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let summary_path = custom_path.join("summary.toml");
            if summary_path.exists() {
                let content = std::fs::read_to_string(&summary_path)?;
                prompts.summary = toml::from_str(&content)?;
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

    /// Render one of the summary templates around `text`.
    pub fn render_summary(&self, template: &str, text: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("text".to_string(), text.to_string());
        self.render_with_custom(template, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert_eq!(prompts.summary.version, SUMMARY_PROMPT_VERSION);
        for template in [
            &prompts.summary.section,
            &prompts.summary.direct,
            &prompts.summary.combined,
        ] {
            assert!(template.contains("{{text}}"));
            assert!(template.contains("\"\"\""));
        }
        assert!(prompts.summary.direct.trim_end().ends_with("Summary:"));
        assert!(prompts.summary.combined.trim_end().ends_with("Summary:"));
        assert_ne!(prompts.summary.direct, prompts.summary.combined);
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_call_site_variables_win() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("text".to_string(), "from config".to_string());
        prompts.variables.insert("topic".to_string(), "finance".to_string());

        let rendered = prompts.render_summary("{{topic}}: {{text}}", "from call");
        assert_eq!(rendered, "finance: from call");
    }

    #[test]
    fn test_load_custom_summary_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("summary.toml"),
            "version = \"custom-1\"\nsection = \"S {{text}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.summary.version, "custom-1");
        assert_eq!(prompts.summary.section, "S {{text}}");
        // Unspecified templates keep their defaults.
        assert_eq!(prompts.summary.direct, SummaryPrompts::default().direct);
    }
}
