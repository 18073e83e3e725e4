//! Review sessions: the server-side home of one document/job pair, its
//! current optimization result and the user's accept/reject choices.
//!
//! Optimize, recalculate and manual calls are last-write-wins. Each takes a
//! `RequestTicket` before calling the model; when it finishes, its result is
//! committed only if no newer ticket has committed in the meantime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::optimization::{OptimizationResult, SuggestedEdit};
use crate::optimize::diff::{self, DiffSpan};
use crate::optimize::optimizer::Rescore;
use crate::optimize::patcher::patch_with_report;
use crate::optimize::review::{EditStatus, ReviewError, ReviewState};

pub mod handlers;
pub mod store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    pub session_id: Uuid,
    pub seq: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSession {
    pub id: Uuid,
    /// Lines as first extracted; never changed.
    pub original_lines: Vec<String>,
    /// Current working document. Replaced by the patched lines after a recalculation.
    pub cv_lines: Vec<String>,
    pub job_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<Value>,
    pub result: OptimizationResult,
    pub review: ReviewState,
    /// Edits committed by earlier rescoring rounds, restated against `original_lines`.
    #[serde(default)]
    pub carried_edits: Vec<SuggestedEdit>,
    /// Match score of every committed result, oldest first.
    pub score_history: Vec<u8>,
    committed_seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewSession {
    pub fn new(
        cv_lines: Vec<String>,
        job_description: String,
        structured_data: Option<Value>,
        result: OptimizationResult,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            original_lines: cv_lines.clone(),
            cv_lines,
            job_description,
            structured_data,
            review: ReviewState::for_edits(result.suggested_edits.len()),
            carried_edits: Vec::new(),
            score_history: vec![result.match_score],
            result,
            committed_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the result if `ticket` is the newest to finish. Returns false when superseded.
    pub fn commit_result(&mut self, ticket: RequestTicket, result: OptimizationResult) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        self.committed_seq = ticket.seq;
        self.review.reload(result.suggested_edits.len());
        self.score_history.push(result.match_score);
        self.result = result;
        self.touch();
        true
    }

    /// Like `commit_result`, and the patched document becomes the working document.
    pub fn commit_rescore(&mut self, ticket: RequestTicket, rescore: Rescore) -> bool {
        if !self.accepts(ticket) {
            return false;
        }
        compose_edits(&mut self.carried_edits, &rescore.applied_edits);
        self.cv_lines = rescore.patched_lines;
        self.commit_result(ticket, rescore.result)
    }

    fn accepts(&self, ticket: RequestTicket) -> bool {
        ticket.session_id == self.id && ticket.seq > self.committed_seq
    }

    pub fn toggle(&mut self, index: usize) -> Result<EditStatus, ReviewError> {
        let status = self.review.toggle(index)?;
        self.touch();
        Ok(status)
    }

    pub fn accept_all(&mut self) {
        self.review.accept_all();
        self.touch();
    }

    pub fn reject_all(&mut self) {
        self.review.reject_all();
        self.touch();
    }

    pub fn patched_text(&self) -> String {
        crate::optimize::patcher::patch(
            &self.cv_lines,
            &self.result.suggested_edits,
            self.review.accepted(),
        )
    }

    /// Every replacement the user has accepted so far, stated against the
    /// original document: carried edits composed with this round's accepted edits.
    pub fn document_edits(&self) -> Vec<SuggestedEdit> {
        let report = patch_with_report(
            &self.cv_lines,
            &self.result.suggested_edits,
            self.review.accepted(),
        );
        let current: Vec<SuggestedEdit> = report
            .applied_edits
            .iter()
            .filter_map(|&index| self.result.suggested_edits.get(index).cloned())
            .collect();

        let mut edits = self.carried_edits.clone();
        compose_edits(&mut edits, &current);
        edits
    }

    /// Recomputed on every call from the current edits and acceptance state.
    pub fn view(&self, superseded: bool) -> SessionView {
        let report = patch_with_report(
            &self.cv_lines,
            &self.result.suggested_edits,
            self.review.accepted(),
        );

        let edits = self
            .result
            .suggested_edits
            .iter()
            .zip(self.review.statuses())
            .enumerate()
            .map(|(index, (edit, status))| EditView {
                index,
                status,
                diff: edit_diff(edit),
                edit: edit.clone(),
            })
            .collect();

        SessionView {
            id: self.id,
            cv_lines: self.cv_lines.clone(),
            job_description: self.job_description.clone(),
            result: self.result.clone(),
            edits,
            accepted_count: self.review.accepted().len(),
            patched_text: report.text,
            unmatched_edits: report.unmatched_edits,
            duplicated_lines: report.duplicated_keys,
            score_history: self.score_history.clone(),
            superseded,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Folds `later` edits into `edits`. A later edit whose original text is the
/// improved text of an earlier one extends that edit; any other is appended.
/// Edits that end up restoring their original text are dropped.
fn compose_edits(edits: &mut Vec<SuggestedEdit>, later: &[SuggestedEdit]) {
    for edit in later {
        let key = edit.original_text.trim();
        let mut extended = false;
        for earlier in edits.iter_mut().filter(|e| e.improved_text.trim() == key) {
            earlier.improved_text = edit.improved_text.clone();
            earlier.reason = edit.reason.clone();
            extended = true;
        }
        if !extended {
            edits.push(edit.clone());
        }
    }
    edits.retain(|e| e.original_text.trim() != e.improved_text.trim());
}

fn edit_diff(edit: &SuggestedEdit) -> Vec<DiffSpan> {
    if edit.original_text.contains('\n') || edit.improved_text.contains('\n') {
        diff::render_bullets(&edit.original_text, &edit.improved_text)
    } else {
        diff::render(&edit.original_text, &edit.improved_text)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditView {
    pub index: usize,
    pub status: EditStatus,
    pub edit: SuggestedEdit,
    pub diff: Vec<DiffSpan>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub cv_lines: Vec<String>,
    pub job_description: String,
    pub result: OptimizationResult,
    pub edits: Vec<EditView>,
    pub accepted_count: usize,
    pub patched_text: String,
    pub unmatched_edits: Vec<usize>,
    pub duplicated_lines: Vec<String>,
    pub score_history: Vec<u8>,
    /// True when the request that produced this view finished after a newer one and was discarded.
    pub superseded: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
