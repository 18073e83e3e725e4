//! Document Patcher.
//!
//! Lines are matched to edits by trimmed text, not by position. Two document
//! lines with the same trimmed text are both rewritten by a matching edit;
//! `patch_with_report` makes that visible instead of changing it.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::models::optimization::SuggestedEdit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchReport {
    pub text: String,
    /// Number of document lines that were rewritten.
    pub replaced_lines: usize,
    /// Accepted edit indices that rewrote at least one line, ascending.
    pub applied_edits: Vec<usize>,
    /// Accepted edit indices whose original text matched no line.
    pub unmatched_edits: Vec<usize>,
    /// Trimmed line texts that occur more than once and were rewritten everywhere.
    pub duplicated_keys: Vec<String>,
}

/// Rewrites `lines` with every accepted edit and joins them with newlines.
///
/// Indices in `accepted` that do not point into `edits` are ignored. When two
/// accepted edits share the same original text, the later one wins.
pub fn patch(lines: &[String], edits: &[SuggestedEdit], accepted: &BTreeSet<usize>) -> String {
    patch_with_report(lines, edits, accepted).text
}

pub fn patch_with_report(
    lines: &[String],
    edits: &[SuggestedEdit],
    accepted: &BTreeSet<usize>,
) -> PatchReport {
    // key -> (edit index, improved text); BTreeSet iteration makes "later wins" deterministic
    let mut replacements: HashMap<&str, (usize, &str)> = HashMap::new();
    for &index in accepted {
        if let Some(edit) = edits.get(index) {
            replacements.insert(edit.original_text.trim(), (index, edit.improved_text.as_str()));
        }
    }

    let mut hits: HashMap<&str, usize> = HashMap::new();
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        let key = line.trim();
        match replacements.get(key) {
            Some((_, improved)) => {
                *hits.entry(key).or_default() += 1;
                out.push(*improved);
            }
            None => out.push(line.as_str()),
        }
    }

    let mut applied_edits: Vec<usize> = replacements
        .iter()
        .filter(|(key, _)| hits.contains_key(*key))
        .map(|(_, (index, _))| *index)
        .collect();
    applied_edits.sort_unstable();

    let mut unmatched_edits: Vec<usize> = replacements
        .iter()
        .filter(|(key, _)| !hits.contains_key(*key))
        .map(|(_, (index, _))| *index)
        .collect();
    unmatched_edits.sort_unstable();

    let mut duplicated_keys: Vec<String> = hits
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(key, _)| key.to_string())
        .collect();
    duplicated_keys.sort();

    if !duplicated_keys.is_empty() {
        warn!(
            "Patched {} duplicated line(s) by content: {:?}",
            duplicated_keys.len(),
            duplicated_keys
        );
    }
    if !unmatched_edits.is_empty() {
        warn!("Accepted edits matched no document line: {:?}", unmatched_edits);
    }

    PatchReport {
        text: out.join("\n"),
        replaced_lines: hits.values().sum(),
        applied_edits,
        unmatched_edits,
        duplicated_keys,
    }
}
