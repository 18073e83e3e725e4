use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("edit index {index} is out of range ({count} edits loaded)")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Accept/reject state for the currently loaded suggested edits.
///
/// Indices are only meaningful against the edit list this state was created
/// for; loading a new list goes through `reload`, which accepts everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    edit_count: usize,
    accepted: BTreeSet<usize>,
}

impl ReviewState {
    pub fn for_edits(edit_count: usize) -> Self {
        Self {
            edit_count,
            accepted: (0..edit_count).collect(),
        }
    }

    pub fn reload(&mut self, edit_count: usize) {
        *self = Self::for_edits(edit_count);
    }

    pub fn edit_count(&self) -> usize {
        self.edit_count
    }

    /// Flips one edit and returns its new status.
    pub fn toggle(&mut self, index: usize) -> Result<EditStatus, ReviewError> {
        if index >= self.edit_count {
            return Err(ReviewError::IndexOutOfRange {
                index,
                count: self.edit_count,
            });
        }
        if self.accepted.remove(&index) {
            Ok(EditStatus::Rejected)
        } else {
            self.accepted.insert(index);
            Ok(EditStatus::Accepted)
        }
    }

    pub fn accept_all(&mut self) {
        self.accepted = (0..self.edit_count).collect();
    }

    pub fn reject_all(&mut self) {
        self.accepted.clear();
    }

    pub fn status(&self, index: usize) -> Option<EditStatus> {
        (index < self.edit_count).then(|| {
            if self.accepted.contains(&index) {
                EditStatus::Accepted
            } else {
                EditStatus::Rejected
            }
        })
    }

    pub fn statuses(&self) -> Vec<EditStatus> {
        (0..self.edit_count).filter_map(|i| self.status(i)).collect()
    }

    pub fn accepted(&self) -> &BTreeSet<usize> {
        &self.accepted
    }
}
