//! Prompt Builder: renders CV lines, a job description and optional structured
//! context into a single prompt string.
//!
//! Templates are plain text with literal `{name}` placeholders. Substitution is
//! a single left-to-right pass, so placeholder-looking text inside a CV or job
//! description is never expanded a second time, and braces that are not a known
//! placeholder (the JSON schema in the template) are left as they are.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::optimization::PromptSource;

use super::prompts::{
    COVER_LETTER_FALLBACK_TEMPLATE, COVER_LETTER_PLACEHOLDERS, COVER_LETTER_TEMPLATE_FILE,
    OPTIMIZATION_FALLBACK_TEMPLATE, OPTIMIZATION_PLACEHOLDERS, OPTIMIZATION_TEMPLATE_FILE,
};

/// Literal substituted for `{structuredData}` when the caller has none.
const NO_STRUCTURED_DATA: &str = "None";

/// Reasons a template resource could not be used. Always recovered by
/// switching to the built-in template.
#[derive(Debug, Error)]
pub enum PromptBuildFailure {
    #[error("no template directory configured")]
    NotConfigured,

    #[error("template {} could not be read: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {} is missing the {{{placeholder}}} placeholder", path.display())]
    MissingPlaceholder { path: PathBuf, placeholder: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltPrompt {
    pub text: String,
    pub source: PromptSource,
}

/// Caller preferences for the cover-letter prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverLetterOptions {
    pub style: String,
    pub tone: String,
    pub focus_areas: Vec<String>,
    pub hiring_manager: Option<String>,
    pub company_name: Option<String>,
    pub job_source: Option<String>,
    pub use_template: bool,
}

impl Default for CoverLetterOptions {
    fn default() -> Self {
        Self {
            style: "professional".to_string(),
            tone: "confident and enthusiastic".to_string(),
            focus_areas: Vec::new(),
            hiring_manager: None,
            company_name: None,
            job_source: None,
            use_template: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    template_dir: Option<PathBuf>,
}

impl PromptBuilder {
    pub fn new(template_dir: Option<PathBuf>) -> Self {
        Self { template_dir }
    }

    /// Renders the optimization prompt. Each CV line stays on its own line.
    pub async fn build(
        &self,
        cv_lines: &[String],
        job_description: &str,
        structured_data: Option<&Value>,
    ) -> BuiltPrompt {
        let cv_text = cv_lines.join("\n");
        let structured = structured_data
            .map(|v| serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()))
            .unwrap_or_else(|| NO_STRUCTURED_DATA.to_string());

        let values = [
            ("cvText", cv_text.as_str()),
            ("jobDescription", job_description),
            ("structuredData", structured.as_str()),
        ];

        let (template, source) = self
            .resolve(
                OPTIMIZATION_TEMPLATE_FILE,
                OPTIMIZATION_PLACEHOLDERS,
                OPTIMIZATION_FALLBACK_TEMPLATE,
            )
            .await;

        BuiltPrompt {
            text: fill_placeholders(&template, &values),
            source,
        }
    }

    pub async fn build_cover_letter(
        &self,
        cv_lines: &[String],
        job_description: &str,
        options: &CoverLetterOptions,
    ) -> BuiltPrompt {
        let cv_text = cv_lines.join("\n");
        let focus_areas = if options.focus_areas.is_empty() {
            "None specified".to_string()
        } else {
            options.focus_areas.join(", ")
        };
        let hiring_manager = options.hiring_manager.as_deref().unwrap_or("Hiring Manager");
        let company_name = options.company_name.as_deref().unwrap_or("Not specified");
        let job_source = options.job_source.as_deref().unwrap_or("Not specified");
        let use_template = if options.use_template { "yes" } else { "no" };

        let values = [
            ("cvText", cv_text.as_str()),
            ("jobDescription", job_description),
            ("coverLetterStyle", options.style.as_str()),
            ("tone", options.tone.as_str()),
            ("focusAreas", focus_areas.as_str()),
            ("hiringManager", hiring_manager),
            ("companyName", company_name),
            ("jobSource", job_source),
            ("useTemplate", use_template),
        ];

        let (template, source) = self
            .resolve(
                COVER_LETTER_TEMPLATE_FILE,
                COVER_LETTER_PLACEHOLDERS,
                COVER_LETTER_FALLBACK_TEMPLATE,
            )
            .await;

        BuiltPrompt {
            text: fill_placeholders(&template, &values),
            source,
        }
    }

    /// Raw optimization template (unfilled) for users running the prompt by hand.
    pub async fn template_text(&self) -> (String, PromptSource) {
        self.resolve(
            OPTIMIZATION_TEMPLATE_FILE,
            OPTIMIZATION_PLACEHOLDERS,
            OPTIMIZATION_FALLBACK_TEMPLATE,
        )
        .await
    }

    async fn resolve(
        &self,
        file_name: &str,
        placeholders: &[&str],
        fallback: &str,
    ) -> (String, PromptSource) {
        match self.load_template(file_name, placeholders).await {
            Ok(template) => {
                debug!("Using prompt template {}", file_name);
                (template, PromptSource::Template)
            }
            Err(e) => {
                warn!("Falling back to built-in prompt: {e}");
                (fallback.to_string(), PromptSource::Fallback)
            }
        }
    }

    async fn load_template(
        &self,
        file_name: &str,
        placeholders: &[&str],
    ) -> Result<String, PromptBuildFailure> {
        let dir = self
            .template_dir
            .as_deref()
            .ok_or(PromptBuildFailure::NotConfigured)?;
        let path = dir.join(file_name);
        let template = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| PromptBuildFailure::Unreadable {
                path: path.clone(),
                source,
            })?;
        check_placeholders(&path, &template, placeholders)?;
        Ok(template)
    }
}

fn check_placeholders(
    path: &Path,
    template: &str,
    placeholders: &[&str],
) -> Result<(), PromptBuildFailure> {
    for name in placeholders {
        if !template.contains(&format!("{{{name}}}")) {
            return Err(PromptBuildFailure::MissingPlaceholder {
                path: path.to_path_buf(),
                placeholder: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Replaces every `{name}` whose name appears in `values`, in one pass.
pub fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let hit = values
            .iter()
            .find(|(name, _)| after.starts_with(name) && after[name.len()..].starts_with('}'));

        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
