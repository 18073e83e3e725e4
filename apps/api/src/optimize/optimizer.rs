use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::gateway::{FeatureId, ModelGateway, ProviderFailure, RequestOptions};
use crate::models::analysis::JobAnalysis;
use crate::models::optimization::{OptimizationResult, PromptSource, SuggestedEdit};

use super::normalizer::{normalize_analysis, normalize_optimization};
use super::patcher::{patch_with_report, PatchReport};
use super::prompt_builder::{BuiltPrompt, CoverLetterOptions, PromptBuilder};
use super::prompts::JOB_ANALYSIS_PROMPT;

pub const FALLBACK_PROMPT_WARNING: &str =
    "The prompt template could not be loaded; the built-in prompt was used.";

/// Outcome of one rescoring round-trip.
#[derive(Debug, Clone)]
pub struct Rescore {
    pub result: OptimizationResult,
    pub patch: PatchReport,
    /// The patched document split back into lines; the new working document.
    pub patched_lines: Vec<String>,
    /// Accepted edits of the scored result that rewrote at least one line.
    pub applied_edits: Vec<SuggestedEdit>,
}

/// Prompt Builder → Model Gateway → Response Normalizer, per feature.
pub struct Optimizer {
    gateway: Arc<ModelGateway>,
    prompts: PromptBuilder,
    options: RequestOptions,
}

impl Optimizer {
    pub fn new(gateway: Arc<ModelGateway>, prompts: PromptBuilder) -> Self {
        Self {
            gateway,
            prompts,
            options: RequestOptions::default(),
        }
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    /// One optimize call. Provider failures propagate; parse failures become the fallback result.
    pub async fn optimize(
        &self,
        cv_lines: &[String],
        job_description: &str,
        structured_data: Option<&Value>,
    ) -> Result<OptimizationResult, ProviderFailure> {
        let prompt = self
            .prompts
            .build(cv_lines, job_description, structured_data)
            .await;
        let raw = self
            .gateway
            .request(FeatureId::GenerateCv, &prompt.text, &self.options)
            .await?;

        let mut result = normalize_optimization(&raw, prompt.source);
        if prompt.source == PromptSource::Fallback {
            result.warnings.push(FALLBACK_PROMPT_WARNING.to_string());
        }

        info!(
            "Optimization finished: score={} edits={} discarded={} fallback={}",
            result.match_score,
            result.suggested_edits.len(),
            result.discarded_edits,
            result.is_fallback
        );
        Ok(result)
    }

    /// Suggestions mode: free text instead of extracted lines.
    pub async fn suggest(
        &self,
        cv_text: &str,
        job_description: &str,
        structured_data: Option<&Value>,
    ) -> Result<OptimizationResult, ProviderFailure> {
        self.optimize(&split_lines(cv_text), job_description, structured_data)
            .await
    }

    /// Rescoring Loop: patch with the accepted edits and score the result once.
    pub async fn recalculate(
        &self,
        current: &OptimizationResult,
        cv_lines: &[String],
        accepted: &BTreeSet<usize>,
        job_description: &str,
    ) -> Result<Rescore, ProviderFailure> {
        let patch = patch_with_report(cv_lines, &current.suggested_edits, accepted);
        let patched_lines = split_lines(&patch.text);
        let applied_edits = patch
            .applied_edits
            .iter()
            .filter_map(|&index| current.suggested_edits.get(index).cloned())
            .collect();

        let mut result = self.optimize(&patched_lines, job_description, None).await?;
        result.previous_match_score = Some(current.match_score);

        info!(
            "Rescored patched document: {} -> {} ({} accepted edits, {} lines replaced)",
            current.match_score,
            result.match_score,
            accepted.len(),
            patch.replaced_lines
        );

        Ok(Rescore {
            result,
            patch,
            patched_lines,
            applied_edits,
        })
    }

    pub async fn analyze_job(&self, job_description: &str) -> Result<JobAnalysis, ProviderFailure> {
        let prompt = JOB_ANALYSIS_PROMPT.replace("{jobDescription}", job_description);
        let raw = self
            .gateway
            .request(FeatureId::JobDescription, &prompt, &self.options)
            .await?;
        Ok(normalize_analysis(&raw))
    }

    /// Returns the letter text exactly as the provider wrote it.
    pub async fn cover_letter(
        &self,
        cv_lines: &[String],
        job_description: &str,
        options: &CoverLetterOptions,
    ) -> Result<(String, PromptSource), ProviderFailure> {
        let prompt = self
            .prompts
            .build_cover_letter(cv_lines, job_description, options)
            .await;
        let text = self
            .gateway
            .request(FeatureId::GenerateCv, &prompt.text, &self.options)
            .await?;
        Ok((text.trim().to_string(), prompt.source))
    }

    /// The filled prompt a user can paste into any model themselves.
    pub async fn manual_prompt(&self, cv_lines: &[String], job_description: &str) -> BuiltPrompt {
        self.prompts.build(cv_lines, job_description, None).await
    }

    /// Normalizes a model response the user pasted back in.
    pub fn apply_manual_response(&self, raw: &str) -> OptimizationResult {
        normalize_optimization(raw, PromptSource::Manual)
    }
}

/// Splits free text into document lines, dropping whitespace-only lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}
