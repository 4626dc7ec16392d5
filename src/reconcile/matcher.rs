use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{BlockId, EstimatedLine, PersistedBlock, StrokeId};
use crate::settings::SyncSettings;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// How a line found its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchTier {
    /// Majority of the line's strokes already belong to the block.
    StrokeIdentity,
    /// Bootstrap fallback on the block's creation-time bounds.
    Interval,
    /// Bound by the line editor.
    Explicit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    /// Recognized text unchanged; the block is left alone.
    Skip {
        line: EstimatedLine,
        block: PersistedBlock,
        tier: MatchTier,
    },
    /// Recognized text changed; text and canonical key are rewritten, bounds are not.
    Update {
        line: EstimatedLine,
        block: PersistedBlock,
        tier: MatchTier,
    },
    Create { line: EstimatedLine },
    /// Existing block with no matching line. Never deleted without confirmation.
    Orphan { block: PersistedBlock },
}

impl ReconcileAction {
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileAction::Skip { .. } => "skip",
            ReconcileAction::Update { .. } => "update",
            ReconcileAction::Create { .. } => "create",
            ReconcileAction::Orphan { .. } => "orphan",
        }
    }

    /// Pairs a matched line and block, skipping when the recognizer text is unchanged.
    pub fn classify(line: EstimatedLine, block: PersistedBlock, tier: MatchTier) -> Self {
        if line.canonical_key == block.comparison_key() {
            ReconcileAction::Skip { line, block, tier }
        } else {
            ReconcileAction::Update { line, block, tier }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCounts {
    pub skip: usize,
    pub update: usize,
    pub create: usize,
    pub orphan: usize,
}

/// Ordered action list for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub actions: Vec<ReconcileAction>,
}

impl ReconcilePlan {
    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts::default();
        for action in &self.actions {
            match action {
                ReconcileAction::Skip { .. } => counts.skip += 1,
                ReconcileAction::Update { .. } => counts.update += 1,
                ReconcileAction::Create { .. } => counts.create += 1,
                ReconcileAction::Orphan { .. } => counts.orphan += 1,
            }
        }
        counts
    }

    pub fn orphans(&self) -> Vec<&PersistedBlock> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                ReconcileAction::Orphan { block } => Some(block),
                _ => None,
            })
            .collect()
    }

    /// True when executing the plan would write nothing to the document store.
    pub fn is_noop(&self) -> bool {
        self.actions.iter().all(|action| {
            matches!(
                action,
                ReconcileAction::Skip { .. } | ReconcileAction::Orphan { .. }
            )
        })
    }
}

struct Candidate {
    line: usize,
    block: usize,
    score: f64,
}

/// Pairs recognized lines with existing blocks.
///
/// `blocks` may come in any order; ties resolve towards the lowest `creation_order`.
/// `associations` maps block ids to the active strokes currently linked to them.
/// Each block matches at most one line and each line at most one block.
pub fn match_blocks(
    blocks: &[PersistedBlock],
    lines: Vec<EstimatedLine>,
    associations: &HashMap<BlockId, BTreeSet<StrokeId>>,
    settings: &SyncSettings,
) -> ReconcilePlan {
    let mut ordered: Vec<&PersistedBlock> = blocks.iter().collect();
    ordered.sort_by_key(|block| block.creation_order);

    let mut line_match: Vec<Option<(usize, MatchTier)>> = vec![None; lines.len()];
    let mut block_taken = vec![false; ordered.len()];

    // Tier 1: stroke identity.
    let mut candidates = Vec::new();
    for (li, line) in lines.iter().enumerate() {
        if line.stroke_ids.is_empty() {
            continue;
        }
        for (bi, block) in ordered.iter().enumerate() {
            let Some(block_strokes) = associations.get(&block.id) else {
                continue;
            };
            let shared = line.stroke_ids.intersection(block_strokes).count();
            let ratio = shared as f64 / line.stroke_ids.len() as f64;
            if ratio > settings.min_overlap_ratio {
                candidates.push(Candidate {
                    line: li,
                    block: bi,
                    score: ratio,
                });
            }
        }
    }
    assign_greedy(candidates, &mut line_match, &mut block_taken, MatchTier::StrokeIdentity);

    // Tier 2: creation-time bounds.
    let mut candidates = Vec::new();
    for (li, line) in lines.iter().enumerate() {
        if line_match[li].is_some() {
            continue;
        }
        for (bi, block) in ordered.iter().enumerate() {
            if block_taken[bi] {
                continue;
            }
            let Some(bounds) = block.bounds else {
                continue;
            };
            if bounds.overlaps(&line.bounds, settings.y_tolerance) {
                candidates.push(Candidate {
                    line: li,
                    block: bi,
                    score: bounds.overlap_len(&line.bounds),
                });
            }
        }
    }
    assign_greedy(candidates, &mut line_match, &mut block_taken, MatchTier::Interval);

    let mut actions = Vec::with_capacity(lines.len() + ordered.len());
    for (line, matched) in lines.into_iter().zip(line_match) {
        let action = match matched {
            Some((bi, tier)) => ReconcileAction::classify(line, ordered[bi].clone(), tier),
            None => ReconcileAction::Create { line },
        };
        log_debug!("line -> {}", action.kind());
        actions.push(action);
    }

    for (block, taken) in ordered.into_iter().zip(block_taken) {
        if !taken {
            log_debug!("block {} has no matching line", block.id);
            actions.push(ReconcileAction::Orphan {
                block: block.clone(),
            });
        }
    }

    ReconcilePlan { actions }
}

/// Highest score first, then oldest block, then earliest line.
fn assign_greedy(
    mut candidates: Vec<Candidate>,
    line_match: &mut [Option<(usize, MatchTier)>],
    block_taken: &mut [bool],
    tier: MatchTier,
) {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.block.cmp(&b.block))
            .then(a.line.cmp(&b.line))
    });

    for candidate in candidates {
        if line_match[candidate.line].is_some() || block_taken[candidate.block] {
            continue;
        }
        line_match[candidate.line] = Some((candidate.block, tier));
        block_taken[candidate.block] = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YBounds;
    use crate::reconcile::canonicalize;
    use chrono::Utc;

    fn block(id: &str, order: i64, text: &str, bounds: Option<(f64, f64)>) -> PersistedBlock {
        PersistedBlock {
            id: BlockId::from(id),
            text: text.to_string(),
            canonical_key: Some(canonicalize(text)),
            bounds: bounds.map(|(a, b)| YBounds::new(a, b)),
            indent_level: None,
            creation_order: order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(text: &str, y: (f64, f64), ids: &[i64]) -> EstimatedLine {
        EstimatedLine::new(
            text,
            YBounds::new(y.0, y.1),
            0,
            ids.iter().map(|id| StrokeId(*id)).collect(),
        )
    }

    fn assoc(entries: &[(&str, &[i64])]) -> HashMap<BlockId, BTreeSet<StrokeId>> {
        entries
            .iter()
            .map(|(id, ids)| {
                (
                    BlockId::from(*id),
                    ids.iter().map(|i| StrokeId(*i)).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn no_blocks_means_all_create() {
        let plan = match_blocks(
            &[],
            vec![line("a", (0.0, 10.0), &[1]), line("b", (20.0, 30.0), &[2])],
            &HashMap::new(),
            &SyncSettings::default(),
        );
        assert_eq!(plan.counts().create, 2);
        assert!(plan.orphans().is_empty());
    }

    #[test]
    fn stroke_identity_beats_interval() {
        // b2's bounds fit the line better, but the strokes belong to b1.
        let blocks = vec![
            block("b1", 1, "hello", Some((100.0, 110.0))),
            block("b2", 2, "other", Some((0.0, 10.0))),
        ];
        let plan = match_blocks(
            &blocks,
            vec![line("Hello", (0.0, 10.0), &[1, 2, 3])],
            &assoc(&[("b1", &[1, 2, 3])]),
            &SyncSettings::default(),
        );
        match &plan.actions[0] {
            ReconcileAction::Skip { block, tier, .. } => {
                assert_eq!(block.id.as_str(), "b1");
                assert_eq!(*tier, MatchTier::StrokeIdentity);
            }
            other => panic!("unexpected action {other:?}"),
        }
        assert_eq!(plan.orphans()[0].id.as_str(), "b2");
    }

    #[test]
    fn ratio_must_exceed_half() {
        let blocks = vec![block("b1", 1, "x", None)];
        let plan = match_blocks(
            &blocks,
            vec![line("x", (0.0, 10.0), &[1, 2])],
            &assoc(&[("b1", &[1])]),
            &SyncSettings::default(),
        );
        assert_eq!(plan.counts().create, 1);
        assert_eq!(plan.counts().orphan, 1);
    }

    #[test]
    fn ties_go_to_oldest_block() {
        let blocks = vec![
            block("newer", 7, "x", None),
            block("older", 3, "x", None),
        ];
        let plan = match_blocks(
            &blocks,
            vec![line("x", (0.0, 10.0), &[1, 2, 3, 4])],
            &assoc(&[("newer", &[1, 2, 3, 4]), ("older", &[1, 2, 3, 4])]),
            &SyncSettings::default(),
        );
        match &plan.actions[0] {
            ReconcileAction::Skip { block, .. } => assert_eq!(block.id.as_str(), "older"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn a_block_matches_only_one_line() {
        let blocks = vec![block("b1", 1, "first", Some((0.0, 10.0)))];
        let plan = match_blocks(
            &blocks,
            vec![
                line("first", (0.0, 10.0), &[1, 2, 3]),
                line("first again", (0.0, 10.0), &[1, 2]),
            ],
            &assoc(&[("b1", &[1, 2, 3])]),
            &SyncSettings::default(),
        );
        let counts = plan.counts();
        assert_eq!(counts.skip, 1);
        assert_eq!(counts.create, 1);
    }

    #[test]
    fn interval_fallback_bootstraps_unlinked_blocks() {
        let blocks = vec![
            block("b1", 1, "groceries", Some((0.0, 10.0))),
            block("b2", 2, "call mom", Some((20.0, 30.0))),
        ];
        let plan = match_blocks(
            &blocks,
            vec![
                line("Groceries!", (1.0, 11.0), &[]),
                line("call dad", (21.0, 29.0), &[5]),
            ],
            &HashMap::new(),
            &SyncSettings::default(),
        );
        assert_eq!(plan.counts(), PlanCounts { skip: 1, update: 1, create: 0, orphan: 0 });
        match &plan.actions[1] {
            ReconcileAction::Update { block, tier, line } => {
                assert_eq!(block.id.as_str(), "b2");
                assert_eq!(*tier, MatchTier::Interval);
                assert_eq!(line.canonical_key, "calldad");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn interval_prefers_largest_overlap() {
        let blocks = vec![
            block("near", 1, "a", Some((0.0, 12.0))),
            block("best", 2, "a", Some((8.0, 30.0))),
        ];
        let plan = match_blocks(
            &blocks,
            vec![line("a", (10.0, 28.0), &[])],
            &HashMap::new(),
            &SyncSettings::default(),
        );
        match &plan.actions[0] {
            ReconcileAction::Skip { block, .. } => assert_eq!(block.id.as_str(), "best"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn blocks_without_stored_key_compare_against_text() {
        let mut legacy = block("b1", 1, "Typed by hand", Some((0.0, 10.0)));
        legacy.canonical_key = None;
        let plan = match_blocks(
            &[legacy],
            vec![line("typed by hand", (0.0, 10.0), &[])],
            &HashMap::new(),
            &SyncSettings::default(),
        );
        assert!(plan.is_noop());
        assert_eq!(plan.counts().skip, 1);
    }
}
