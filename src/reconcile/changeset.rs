use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{StoredStroke, Stroke, StrokeId};

/// Net stroke difference between the session and the persisted snapshot of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub additions: Vec<StrokeId>,
    pub deletions: Vec<StrokeId>,
    /// `additions.len() + deletions.len()`.
    pub total: usize,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Diffs active in-memory strokes against persisted ones by id. Ids are sorted.
pub fn compute_change_set(active: &[&Stroke], persisted: &[StoredStroke]) -> ChangeSet {
    let current: BTreeSet<StrokeId> = active
        .iter()
        .filter(|stroke| stroke.is_active())
        .map(|stroke| stroke.id)
        .collect();
    let saved: BTreeSet<StrokeId> = persisted.iter().map(|stroke| stroke.id).collect();

    let additions: Vec<StrokeId> = current.difference(&saved).copied().collect();
    let deletions: Vec<StrokeId> = saved.difference(&current).copied().collect();
    let total = additions.len() + deletions.len();

    ChangeSet {
        additions,
        deletions,
        total,
    }
}
