use serde::{Deserialize, Serialize};

/// Structured summary of a job description produced by the analysis feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAnalysis {
    pub keywords: Vec<String>,
    pub skills: Vec<String>,
    pub requirements: Vec<String>,
    pub industry: Option<String>,
    pub level: Option<String>,
    pub summary: Option<String>,
    pub model: String,
    pub is_fallback: bool,
}
