use std::collections::{BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{BlockId, Stroke, StrokeId, YBounds};
use crate::reconcile::{ReconcileAction, ReconcilePlan};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("line index {0} is out of range")]
    OutOfRange(usize),

    #[error("merge needs at least two distinct lines")]
    NotEnoughLines,

    #[error("split halves must both contain text")]
    EmptySplit,
}

/// One editable line and the block bookkeeping a commit needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorLine {
    pub text: String,
    pub bounds: YBounds,
    pub indent_level: u32,
    /// Surviving block for this line; `None` means the commit creates one.
    pub block_id: Option<BlockId>,
    /// Blocks merged into this line; retired on commit after their strokes move here.
    pub blocks_to_delete: Vec<BlockId>,
    pub stroke_ids: BTreeSet<StrokeId>,
}

impl EditorLine {
    pub fn new(text: impl Into<String>, bounds: YBounds) -> Self {
        Self {
            text: text.into(),
            bounds,
            indent_level: 0,
            block_id: None,
            blocks_to_delete: Vec::new(),
            stroke_ids: BTreeSet::new(),
        }
    }

    fn from_action(action: &ReconcileAction) -> Option<Self> {
        let (line, block_id) = match action {
            ReconcileAction::Skip { line, block, .. } | ReconcileAction::Update { line, block, .. } => {
                (line, Some(block.id.clone()))
            }
            ReconcileAction::Create { line } => (line, None),
            ReconcileAction::Orphan { .. } => return None,
        };
        Some(Self {
            text: line.text.clone(),
            bounds: line.bounds,
            indent_level: line.indent_level,
            block_id,
            blocks_to_delete: Vec::new(),
            stroke_ids: line.link_ids.clone(),
        })
    }
}

/// Merge/split editor over recognized lines with bounded undo/redo.
///
/// Nothing here touches persisted state; `into_lines` hands the result to
/// [`plan_commit`](super::plan_commit).
#[derive(Debug, Clone)]
pub struct LineEditor {
    lines: Vec<EditorLine>,
    stroke_centers: HashMap<StrokeId, f64>,
    undo: VecDeque<Vec<EditorLine>>,
    redo: Vec<Vec<EditorLine>>,
    max_history: usize,
}

impl LineEditor {
    pub fn new<'a, I>(lines: Vec<EditorLine>, strokes: I, max_history: usize) -> Self
    where
        I: IntoIterator<Item = &'a Stroke>,
    {
        let stroke_centers = strokes
            .into_iter()
            .filter_map(|stroke| stroke.y_bounds().map(|b| (stroke.id, b.center())))
            .collect();
        Self {
            lines,
            stroke_centers,
            undo: VecDeque::new(),
            redo: Vec::new(),
            max_history: max_history.max(1),
        }
    }

    /// Seeds the editor from a reconciliation plan; orphans are left out.
    pub fn from_plan<'a, I>(plan: &ReconcilePlan, strokes: I, max_history: usize) -> Self
    where
        I: IntoIterator<Item = &'a Stroke>,
    {
        let lines = plan
            .actions
            .iter()
            .filter_map(EditorLine::from_action)
            .collect();
        Self::new(lines, strokes, max_history)
    }

    pub fn lines(&self) -> &[EditorLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<EditorLine> {
        self.lines
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Combines the selected lines into the position of the first one.
    ///
    /// The first selected line that has a block keeps it; every other block among
    /// the selection is queued for deletion. Returns the merged line's index.
    pub fn merge(&mut self, indices: &[usize]) -> Result<usize, EditorError> {
        let selected: Vec<usize> = indices
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if selected.len() < 2 {
            return Err(EditorError::NotEnoughLines);
        }
        if let Some(&bad) = selected.iter().find(|&&i| i >= self.lines.len()) {
            return Err(EditorError::OutOfRange(bad));
        }

        let first = selected[0];
        let mut merged = self.lines[first].clone();
        merged.text = merged.text.trim().to_string();
        let mut doomed: Vec<BlockId> = Vec::new();
        for &index in &selected[1..] {
            let line = &self.lines[index];
            let text = line.text.trim();
            if !text.is_empty() {
                if !merged.text.is_empty() {
                    merged.text.push(' ');
                }
                merged.text.push_str(text);
            }
            merged.bounds = merged.bounds.union(&line.bounds);
            merged.stroke_ids.extend(line.stroke_ids.iter().copied());
            match (&merged.block_id, &line.block_id) {
                (None, Some(id)) => merged.block_id = Some(id.clone()),
                (Some(_), Some(id)) => doomed.push(id.clone()),
                _ => {}
            }
            doomed.extend(line.blocks_to_delete.iter().cloned());
        }
        for id in doomed {
            if Some(&id) != merged.block_id.as_ref() && !merged.blocks_to_delete.contains(&id) {
                merged.blocks_to_delete.push(id);
            }
        }

        self.checkpoint();
        for &index in selected[1..].iter().rev() {
            self.lines.remove(index);
        }
        self.lines[first] = merged;
        Ok(first)
    }

    /// Divides a line at the midpoint of its bounds.
    ///
    /// The upper half keeps the block (and any pending deletions); the lower half
    /// starts unbound. Strokes follow their vertical center.
    pub fn split(&mut self, index: usize, text_a: &str, text_b: &str) -> Result<(), EditorError> {
        let original = self
            .lines
            .get(index)
            .cloned()
            .ok_or(EditorError::OutOfRange(index))?;
        if text_a.trim().is_empty() || text_b.trim().is_empty() {
            return Err(EditorError::EmptySplit);
        }

        let (upper_bounds, lower_bounds) = original.bounds.split_at_midpoint();
        let mid = upper_bounds.max_y;
        let (upper_ids, lower_ids): (BTreeSet<StrokeId>, BTreeSet<StrokeId>) = original
            .stroke_ids
            .iter()
            .partition(|id| {
                self.stroke_centers
                    .get(*id)
                    .map_or(true, |center| *center < mid)
            });

        let upper = EditorLine {
            text: text_a.trim().to_string(),
            bounds: upper_bounds,
            stroke_ids: upper_ids,
            ..original.clone()
        };
        let lower = EditorLine {
            text: text_b.trim().to_string(),
            bounds: lower_bounds,
            indent_level: original.indent_level,
            block_id: None,
            blocks_to_delete: Vec::new(),
            stroke_ids: lower_ids,
        };

        self.checkpoint();
        self.lines[index] = upper;
        self.lines.insert(index + 1, lower);
        Ok(())
    }

    pub fn set_text(&mut self, index: usize, text: &str) -> Result<(), EditorError> {
        if index >= self.lines.len() {
            return Err(EditorError::OutOfRange(index));
        }
        self.checkpoint();
        self.lines[index].text = text.to_string();
        Ok(())
    }

    /// Metadata-only change; strokes and blocks are unaffected.
    pub fn set_indent(&mut self, index: usize, indent_level: u32) -> Result<(), EditorError> {
        if index >= self.lines.len() {
            return Err(EditorError::OutOfRange(index));
        }
        self.checkpoint();
        self.lines[index].indent_level = indent_level;
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        match self.undo.pop_back() {
            Some(previous) => {
                let current = std::mem::replace(&mut self.lines, previous);
                self.redo.push(current);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.redo.pop() {
            Some(next) => {
                let current = std::mem::replace(&mut self.lines, next);
                self.push_undo(current);
                true
            }
            None => false,
        }
    }

    fn checkpoint(&mut self) {
        let snapshot = self.lines.clone();
        self.push_undo(snapshot);
        self.redo.clear();
    }

    fn push_undo(&mut self, snapshot: Vec<EditorLine>) {
        if self.undo.len() == self.max_history {
            self.undo.pop_front();
        }
        self.undo.push_back(snapshot);
    }
}
