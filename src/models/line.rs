use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{BlockId, StrokeId, YBounds};

/// One line of the recognizer's segmentation of a stroke batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedLine {
    pub text: String,
    #[serde(rename = "boundingInterval")]
    pub bounds: YBounds,
    #[serde(default)]
    pub indent_level: u32,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub children: Vec<usize>,
}

impl RecognizedLine {
    pub fn new(text: impl Into<String>, bounds: YBounds) -> Self {
        Self {
            text: text.into(),
            bounds,
            indent_level: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_indent(mut self, indent_level: u32) -> Self {
        self.indent_level = indent_level;
        self
    }
}

/// Full recognizer response for one page batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recognition {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub lines: Vec<RecognizedLine>,
}

impl Recognition {
    pub fn from_lines(lines: Vec<RecognizedLine>) -> Self {
        let text = lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self { text, lines }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.text.trim().is_empty())
    }
}

/// A line paired with the strokes estimated to have produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedLine {
    pub text: String,
    pub bounds: YBounds,
    pub indent_level: u32,
    /// Tolerance-widened estimate; used for matching.
    pub stroke_ids: BTreeSet<StrokeId>,
    /// Subset of `stroke_ids` this line links on execution. Within one batch a
    /// stroke is linked by at most one line.
    #[serde(default)]
    pub link_ids: BTreeSet<StrokeId>,
    pub canonical_key: String,
    /// Explicit block binding set by the line editor; recognizer lines leave it empty.
    #[serde(default)]
    pub block_id: Option<BlockId>,
    /// Blocks folded into this line by a merge. Their strokes move to this line's block.
    #[serde(default)]
    pub supersedes: Vec<BlockId>,
}

impl EstimatedLine {
    pub fn new(
        text: impl Into<String>,
        bounds: YBounds,
        indent_level: u32,
        stroke_ids: BTreeSet<StrokeId>,
    ) -> Self {
        let text = text.into();
        let canonical_key = crate::reconcile::canonicalize(&text);
        Self {
            text,
            bounds,
            indent_level,
            link_ids: stroke_ids.clone(),
            stroke_ids,
            canonical_key,
            block_id: None,
            supersedes: Vec::new(),
        }
    }
}
