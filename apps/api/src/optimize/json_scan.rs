//! Tolerant JSON extraction from model output.
//!
//! Models wrap their answer in prose or code fences, and sometimes echo the
//! example schema from the prompt before the real answer. Instead of brace
//! matching, every `{` is handed to a streaming JSON deserializer which reads
//! exactly one complete value or fails; successful objects become candidates
//! and scanning resumes after them.

use serde_json::{Deserializer, Map, Value};

use super::normalizer::NormalizeError;

/// Top-level keys that identify the answer a call site is waiting for.
#[derive(Debug, Clone, Copy)]
pub struct ExpectedShape {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

impl ExpectedShape {
    pub const OPTIMIZATION: ExpectedShape = ExpectedShape {
        name: "optimization",
        keys: &[
            "suggestedEdits",
            "matchScore",
            "analysis",
            "recommendations",
            "overallRecommendations",
        ],
    };

    pub const ANALYSIS: ExpectedShape = ExpectedShape {
        name: "analysis",
        keys: &["keywords", "skills", "requirements"],
    };

    pub fn matches(&self, object: &Map<String, Value>) -> bool {
        self.keys.iter().any(|k| object.contains_key(*k))
    }
}

/// Strips one surrounding ```json / ``` fence if the text is fenced.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
}

/// Every top-level JSON object in `text`, in order of appearance.
pub fn object_candidates(text: &str) -> Vec<Map<String, Value>> {
    let mut found = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        let mut stream = Deserializer::from_str(&text[start..]).into_iter::<Value>();

        match stream.next() {
            Some(Ok(Value::Object(object))) => {
                pos = start + stream.byte_offset();
                found.push(object);
            }
            _ => pos = start + 1,
        }
    }

    found
}

/// `prefer-expected-shape`: the first candidate object carrying at least one
/// of the shape's keys wins, even if other objects appear before it.
pub fn prefer_expected_shape(
    raw: &str,
    shape: ExpectedShape,
) -> Result<Map<String, Value>, NormalizeError> {
    let candidates = object_candidates(strip_code_fence(raw));
    if candidates.is_empty() {
        return Err(NormalizeError::NoJson);
    }

    let total = candidates.len();
    candidates
        .into_iter()
        .find(|c| shape.matches(c))
        .ok_or(NormalizeError::UnexpectedShape {
            shape: shape.name,
            candidates: total,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fence(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_code_fence_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fence(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_code_fence_no_fence() {
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_candidates_skip_prose_and_broken_braces() {
        let text = r#"Sure! {not json} Here you go: {"a": {"b": 1}} and also {"c": "}"} end"#;
        let found = object_candidates(text);
        assert_eq!(found.len(), 2);
        assert!(found[0].contains_key("a"));
        assert_eq!(found[1]["c"], "}");
    }

    #[test]
    fn test_nested_objects_are_not_separate_candidates() {
        let found = object_candidates(r#"{"outer": {"inner": {"deep": true}}}"#);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_prefers_object_with_expected_key() {
        let raw = r#"Example: {"name": "schema"}
Answer: {"keywords": ["rust"], "skills": []}"#;
        let object = prefer_expected_shape(raw, ExpectedShape::ANALYSIS).unwrap();
        assert_eq!(object["keywords"][0], "rust");
    }

    #[test]
    fn test_no_json_and_unexpected_shape() {
        assert!(matches!(
            prefer_expected_shape("nothing here", ExpectedShape::OPTIMIZATION),
            Err(NormalizeError::NoJson)
        ));
        assert!(matches!(
            prefer_expected_shape(r#"{"foo": 1} {"bar": 2}"#, ExpectedShape::OPTIMIZATION),
            Err(NormalizeError::UnexpectedShape { candidates: 2, .. })
        ));
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let raw = format!("{}{}", "{\"a\":".repeat(5000), "1");
        assert!(object_candidates(&raw).is_empty());
    }
}
