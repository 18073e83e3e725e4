//! Response Normalizer: turns raw model text into a validated result.
//!
//! The parsing functions return `Result<_, NormalizeError>` and contain no
//! fallback data. `normalize_optimization` and `normalize_analysis` are the
//! only places an error becomes the labelled fallback object.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::analysis::JobAnalysis;
use crate::models::optimization::{
    JobDetails, KeywordSuggestion, OptimizationResult, PromptSource, SuggestedEdit,
};

use super::json_scan::{prefer_expected_shape, ExpectedShape};

/// Model name recorded when the response does not identify itself.
pub const UNKNOWN_MODEL: &str = "UNKNOWN";
/// Model name carried by fallback results.
pub const FALLBACK_MODEL: &str = "fallback";
/// Shortest improved text (trimmed, in characters) an edit may carry.
pub const MIN_IMPROVED_CHARS: usize = 10;

/// Phrases that mark an improvement as a template rather than a real rewrite.
const PLACEHOLDER_PHRASES: &[&str] = &[
    "add specific",
    "etc.",
    "generic",
    "[insert",
    "insert your",
    "list your",
    "list relevant",
    "list skills",
    "lorem ipsum",
];

pub const PARSE_WARNING: &str =
    "The model response could not be parsed. Showing placeholder suggestions; results may be unreliable.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("no JSON object found in model response")]
    NoJson,

    #[error("none of the {candidates} JSON objects looked like an {shape} response")]
    UnexpectedShape {
        shape: &'static str,
        candidates: usize,
    },
}

/// Why a single suggested edit was dropped. Not an error: the rest of the batch is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditRejection {
    MissingText,
    Unchanged,
    TooShort,
    GenericPlaceholder,
}

pub fn validate_edit(original: &str, improved: &str) -> Result<(), EditRejection> {
    let original = original.trim();
    let improved = improved.trim();
    if original.is_empty() || improved.is_empty() {
        return Err(EditRejection::MissingText);
    }

    let improved_lower = improved.to_lowercase();
    if original.to_lowercase() == improved_lower {
        return Err(EditRejection::Unchanged);
    }
    if improved.chars().count() < MIN_IMPROVED_CHARS {
        return Err(EditRejection::TooShort);
    }
    if PLACEHOLDER_PHRASES
        .iter()
        .any(|p| contains_phrase(&improved_lower, p))
    {
        return Err(EditRejection::GenericPlaceholder);
    }
    Ok(())
}

/// True when `phrase` occurs in `text` as whole words: an alphanumeric end of
/// the phrase may not continue into a neighbouring alphanumeric character.
fn contains_phrase(text: &str, phrase: &str) -> bool {
    let starts_in_word = phrase.chars().next().is_some_and(char::is_alphanumeric);
    let ends_in_word = phrase.chars().last().is_some_and(char::is_alphanumeric);

    text.match_indices(phrase).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + phrase.len()..].chars().next();
        !(starts_in_word && before.is_some_and(char::is_alphanumeric))
            && !(ends_in_word && after.is_some_and(char::is_alphanumeric))
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Optimization responses
// ────────────────────────────────────────────────────────────────────────────

/// Parses an optimization response. `prompt_source` is left at its default.
pub fn parse_optimization(raw: &str) -> Result<OptimizationResult, NormalizeError> {
    let object = prefer_expected_shape(raw, ExpectedShape::OPTIMIZATION)?;

    let (suggested_edits, discarded_edits) = collect_edits(object.get("suggestedEdits"));

    let match_score = object
        .get("matchScore")
        .and_then(score)
        .or_else(|| object.get("analysis").and_then(|a| a.get("overallMatch")).and_then(score))
        .unwrap_or(0);

    let overall_recommendations = match object.get("overallRecommendations") {
        Some(v) => string_list(v),
        None => object.get("recommendations").map(string_list).unwrap_or_default(),
    };

    Ok(OptimizationResult {
        model: string_field(&object, "model").unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
        match_score,
        keywords: object.get("keywords").map(keyword_list).unwrap_or_default(),
        keyword_suggestions: object
            .get("keywordSuggestions")
            .map(keyword_suggestions)
            .unwrap_or_default(),
        improvements: object.get("improvements").map(string_list).unwrap_or_default(),
        suggested_edits,
        overall_recommendations,
        predicted_match_score_if_keywords_added: object
            .get("predictedMatchScoreIfKeywordsAdded")
            .and_then(score),
        job_details: object.get("jobDetails").and_then(job_details),
        previous_match_score: None,
        is_fallback: false,
        prompt_source: PromptSource::default(),
        discarded_edits,
        warnings: Vec::new(),
    })
}

/// Never fails: unparseable responses become the fallback result.
pub fn normalize_optimization(raw: &str, prompt_source: PromptSource) -> OptimizationResult {
    match parse_optimization(raw) {
        Ok(mut result) => {
            result.prompt_source = prompt_source;
            result
        }
        Err(e) => {
            warn!("Optimization response rejected, using fallback: {e}");
            fallback_optimization(prompt_source)
        }
    }
}

/// Fixed placeholder result shown when the model output is unusable.
pub fn fallback_optimization(prompt_source: PromptSource) -> OptimizationResult {
    OptimizationResult {
        model: FALLBACK_MODEL.to_string(),
        match_score: 75,
        keywords: vec!["technology".to_string(), "development".to_string()],
        keyword_suggestions: Vec::new(),
        improvements: vec![
            "Add specific technologies".to_string(),
            "Include quantifiable achievements".to_string(),
        ],
        suggested_edits: vec![SuggestedEdit {
            section: None,
            original_text: "Experienced developer".to_string(),
            improved_text: "Experienced software developer with expertise in modern technologies"
                .to_string(),
            reason: "Added specific role and technology focus".to_string(),
        }],
        overall_recommendations: vec![
            "Add more specific technologies".to_string(),
            "Include quantifiable achievements".to_string(),
            "Use action verbs consistently".to_string(),
        ],
        predicted_match_score_if_keywords_added: None,
        job_details: None,
        previous_match_score: None,
        is_fallback: true,
        prompt_source,
        discarded_edits: 0,
        warnings: vec![PARSE_WARNING.to_string()],
    }
}

fn collect_edits(value: Option<&Value>) -> (Vec<SuggestedEdit>, usize) {
    let Some(items) = value.and_then(Value::as_array) else {
        return (Vec::new(), 0);
    };

    let mut kept = Vec::with_capacity(items.len());
    let mut discarded = 0;

    for item in items {
        let Some(edit) = item.as_object() else {
            discarded += 1;
            continue;
        };
        let original = first_string(edit, &["originalBullet", "original", "originalText", "currentText"]);
        let improved = first_string(edit, &["improvedBullet", "suggested", "improvedText", "suggestedText"]);

        let (original, improved) = match (original, improved) {
            (Some(o), Some(i)) => (o, i),
            _ => {
                debug!("Dropping suggested edit without original/improved text");
                discarded += 1;
                continue;
            }
        };

        if let Err(rejection) = validate_edit(&original, &improved) {
            debug!("Dropping suggested edit ({:?}): {:?}", rejection, original);
            discarded += 1;
            continue;
        }

        kept.push(SuggestedEdit {
            section: string_field(edit, "section"),
            original_text: original,
            improved_text: improved,
            reason: string_field(edit, "reason").unwrap_or_default(),
        });
    }

    (kept, discarded)
}

fn keyword_suggestions(value: &Value) -> Vec<KeywordSuggestion> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .filter_map(|o| {
            Some(KeywordSuggestion {
                keyword: string_field(o, "keyword")?,
                suggestion: string_field(o, "suggestion").unwrap_or_default(),
            })
        })
        .collect()
}

/// Keywords arrive either as a list or as `{missingKeywords, jobKeywords}`.
fn keyword_list(value: &Value) -> Vec<String> {
    match value {
        Value::Object(o) => o
            .get("missingKeywords")
            .or_else(|| o.get("jobKeywords"))
            .map(keyword_list)
            .unwrap_or_default(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => string_field(o, "keyword"),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn job_details(value: &Value) -> Option<JobDetails> {
    let o = value.as_object()?;
    let details = JobDetails {
        company: scalar_text(o, "company"),
        location: scalar_text(o, "location"),
        salary: scalar_text(o, "salary"),
        contract_length: scalar_text(o, "contractLength"),
        job_type: scalar_text(o, "jobType"),
        other: scalar_text(o, "other"),
    };
    (details != JobDetails::default()).then_some(details)
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis responses
// ────────────────────────────────────────────────────────────────────────────

pub fn parse_analysis(raw: &str) -> Result<JobAnalysis, NormalizeError> {
    let object = prefer_expected_shape(raw, ExpectedShape::ANALYSIS)?;

    Ok(JobAnalysis {
        keywords: object.get("keywords").map(keyword_list).unwrap_or_default(),
        skills: object.get("skills").map(string_list).unwrap_or_default(),
        requirements: object.get("requirements").map(string_list).unwrap_or_default(),
        industry: string_field(&object, "industry"),
        level: string_field(&object, "level"),
        summary: string_field(&object, "summary"),
        model: string_field(&object, "model").unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
        is_fallback: false,
    })
}

pub fn normalize_analysis(raw: &str) -> JobAnalysis {
    parse_analysis(raw).unwrap_or_else(|e| {
        warn!("Analysis response rejected, using fallback: {e}");
        fallback_analysis()
    })
}

pub fn fallback_analysis() -> JobAnalysis {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    JobAnalysis {
        keywords: owned(&["technology", "development", "experience"]),
        skills: owned(&["Technical Skills", "Communication", "Problem Solving"]),
        requirements: owned(&["Bachelor's degree", "Experience in field"]),
        industry: Some("Technology".to_string()),
        level: Some("Mid".to_string()),
        summary: Some("Technical role requiring relevant experience".to_string()),
        model: FALLBACK_MODEL.to_string(),
        is_fallback: true,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field helpers
// ────────────────────────────────────────────────────────────────────────────

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Like `string_field` but also accepts numbers (salaries often come back numeric).
fn scalar_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::Number(n) => Some(n.to_string()),
        _ => string_field(object, key),
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| object.get(*k).and_then(Value::as_str).map(str::to_string))
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Accepts `72`, `72.4`, `"72"` or `"72%"`, clamped to 0..=100.
fn score(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as u8)
}
