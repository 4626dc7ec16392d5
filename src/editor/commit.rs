use std::collections::{HashMap, HashSet};

use crate::models::{BlockId, EstimatedLine, PersistedBlock};
use crate::reconcile::{MatchTier, ReconcileAction, ReconcilePlan};

use super::state::EditorLine;

/// Turns edited lines into an action list against the blocks currently in the store.
///
/// Lines bound to an existing block are classified skip/update on that block alone.
/// Unbound lines are created. A binding to a block that vanished from the store, or
/// that an earlier line already claimed, becomes a create which supersedes the stale
/// id so its strokes follow. Blocks neither bound nor queued for deletion are orphans.
pub fn plan_commit(lines: Vec<EditorLine>, existing: &[PersistedBlock]) -> ReconcilePlan {
    let by_id: HashMap<&BlockId, &PersistedBlock> =
        existing.iter().map(|block| (&block.id, block)).collect();
    let mut claimed: HashSet<BlockId> = HashSet::new();
    let mut actions = Vec::with_capacity(lines.len());

    for line in lines {
        let mut estimated =
            EstimatedLine::new(line.text.trim(), line.bounds, line.indent_level, line.stroke_ids);
        estimated.supersedes = line.blocks_to_delete;
        claimed.extend(estimated.supersedes.iter().cloned());

        let target = line
            .block_id
            .as_ref()
            .and_then(|id| by_id.get(id).copied())
            .filter(|block| !claimed.contains(&block.id));

        match target {
            Some(block) => {
                claimed.insert(block.id.clone());
                estimated.block_id = Some(block.id.clone());
                actions.push(ReconcileAction::classify(
                    estimated,
                    block.clone(),
                    MatchTier::Explicit,
                ));
            }
            None => {
                if let Some(stale) = line.block_id {
                    if !estimated.supersedes.contains(&stale) && !by_id.contains_key(&stale) {
                        estimated.supersedes.push(stale);
                    }
                }
                actions.push(ReconcileAction::Create { line: estimated });
            }
        }
    }

    let mut orphans: Vec<&PersistedBlock> = existing
        .iter()
        .filter(|block| !claimed.contains(&block.id))
        .collect();
    orphans.sort_by_key(|block| block.creation_order);
    actions.extend(orphans.into_iter().map(|block| ReconcileAction::Orphan {
        block: block.clone(),
    }));

    ReconcilePlan { actions }
}
