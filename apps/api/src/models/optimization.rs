use serde::{Deserialize, Serialize};

/// Where the prompt that produced a result came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptSource {
    /// External template resource loaded and filled successfully.
    #[default]
    Template,
    /// Built-in template used because the resource was unavailable.
    Fallback,
    /// The user ran the prompt themselves and pasted the response back.
    Manual,
}

/// A proposed replacement of one document line.
///
/// Only the response normalizer creates these, and only after the edit passed
/// the validity filter. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub original_text: String,
    pub improved_text: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSuggestion {
    pub keyword: String,
    pub suggestion: String,
}

/// Job details the model pulled out of the job description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub contract_length: Option<String>,
    pub job_type: Option<String>,
    pub other: Option<String>,
}

/// The current optimization outcome for a document/job pair.
///
/// Replaced wholesale by every optimize, recalculate or manual call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub model: String,
    pub match_score: u8, // 0 – 100
    pub keywords: Vec<String>,
    #[serde(default)]
    pub keyword_suggestions: Vec<KeywordSuggestion>,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub suggested_edits: Vec<SuggestedEdit>,
    #[serde(default)]
    pub overall_recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_match_score_if_keywords_added: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_details: Option<JobDetails>,
    /// Score of the result this one replaced, set by the rescoring loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_match_score: Option<u8>,
    pub is_fallback: bool,
    pub prompt_source: PromptSource,
    /// Suggested edits dropped by the validity filter.
    #[serde(default)]
    pub discarded_edits: usize,
    /// Non-fatal notices for the user (fallback template, unparseable response).
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_source_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PromptSource::Fallback).unwrap(),
            r#""fallback""#
        );
        let manual: PromptSource = serde_json::from_str(r#""manual""#).unwrap();
        assert_eq!(manual, PromptSource::Manual);
    }

    #[test]
    fn test_suggested_edit_uses_camel_case_and_skips_missing_section() {
        let edit = SuggestedEdit {
            section: None,
            original_text: "Built web apps.".to_string(),
            improved_text: "Built 3 production web apps using React and Node.".to_string(),
            reason: "Quantified".to_string(),
        };
        let json = serde_json::to_value(&edit).unwrap();
        assert_eq!(json["originalText"], "Built web apps.");
        assert!(json.get("section").is_none());
    }
}
