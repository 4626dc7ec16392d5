use serde::Serialize;

use crate::models::{
    AssignOutcome, BlockId, BlockUpdate, EstimatedLine, NewBlock, PageRef, PersistedBlock,
    Reassignment, StrokeCollection, StrokeId,
};
use crate::store::DocumentStore;

use super::matcher::{ReconcileAction, ReconcilePlan};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteKind {
    Create,
    Update,
    Retire,
}

/// A single document-store call that failed; the rest of the batch still ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFailure {
    pub kind: WriteKind,
    pub block_id: Option<BlockId>,
    pub text: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Blocks deleted after a merge moved their strokes elsewhere.
    pub retired: usize,
    pub created_blocks: Vec<BlockId>,
    /// Awaiting caller confirmation; nothing was deleted.
    pub orphaned: Vec<PersistedBlock>,
    pub failures: Vec<WriteFailure>,
    /// Strokes left on their existing block instead of being silently moved.
    pub conflicts: Vec<StrokeId>,
    pub reassignments: Vec<Reassignment>,
    pub associations_changed: bool,
}

impl ExecutionReport {
    pub fn store_writes(&self) -> usize {
        self.created + self.updated + self.retired
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies `plan` to the document store and links strokes to the resulting blocks.
///
/// Store failures are recorded per action and never abort the batch. Orphans are
/// returned untouched.
pub async fn apply_plan<D>(
    store: &D,
    page: &PageRef,
    plan: ReconcilePlan,
    strokes: &mut StrokeCollection,
) -> ExecutionReport
where
    D: DocumentStore + ?Sized,
{
    let mut report = ExecutionReport::default();

    for action in plan.actions {
        match action {
            ReconcileAction::Skip { line, block, .. } => {
                report.skipped += 1;
                settle_line(store, page, &line, &block.id, strokes, &mut report).await;
            }
            ReconcileAction::Update { line, block, .. } => {
                let update = BlockUpdate {
                    text: line.text.clone(),
                    canonical_key: line.canonical_key.clone(),
                };
                match store.update_block(&block.id, update).await {
                    Ok(()) => {
                        report.updated += 1;
                        log_debug!("updated block {} on {}", block.id, page);
                        settle_line(store, page, &line, &block.id, strokes, &mut report).await;
                    }
                    Err(err) => {
                        log_error!("failed to update block {}: {err}", block.id);
                        report.failures.push(WriteFailure {
                            kind: WriteKind::Update,
                            block_id: Some(block.id),
                            text: Some(line.text),
                            message: err.to_string(),
                        });
                    }
                }
            }
            ReconcileAction::Create { line } => {
                let draft = NewBlock {
                    text: line.text.clone(),
                    canonical_key: line.canonical_key.clone(),
                    bounds: line.bounds,
                    indent_level: line.indent_level,
                };
                match store.create_block(page, draft).await {
                    Ok(block_id) => {
                        report.created += 1;
                        log_debug!("created block {} on {}", block_id, page);
                        settle_line(store, page, &line, &block_id, strokes, &mut report).await;
                        report.created_blocks.push(block_id);
                    }
                    Err(err) => {
                        log_error!("failed to create block for '{}': {err}", line.text);
                        report.failures.push(WriteFailure {
                            kind: WriteKind::Create,
                            block_id: None,
                            text: Some(line.text),
                            message: err.to_string(),
                        });
                    }
                }
            }
            ReconcileAction::Orphan { block } => {
                report.orphaned.push(block);
            }
        }
    }

    log_info!(
        "applied plan on {}: created={} updated={} skipped={} retired={} orphaned={} failed={}",
        page,
        report.created,
        report.updated,
        report.skipped,
        report.retired,
        report.orphaned.len(),
        report.failures.len()
    );

    report
}

/// Retires blocks the line supersedes, then links the line's owned strokes to `target`.
async fn settle_line<D>(
    store: &D,
    page: &PageRef,
    line: &EstimatedLine,
    target: &BlockId,
    strokes: &mut StrokeCollection,
    report: &mut ExecutionReport,
) where
    D: DocumentStore + ?Sized,
{
    for retired in line.supersedes.iter().filter(|id| *id != target) {
        let moved = strokes.reassign_block(page, retired, target);
        if !moved.is_empty() {
            report.associations_changed = true;
        }
        report.reassignments.extend(moved);

        match store.delete_block(retired).await {
            Ok(()) => {
                report.retired += 1;
                log_debug!("retired block {} into {}", retired, target);
            }
            Err(err) => {
                log_error!("failed to retire block {retired}: {err}");
                report.failures.push(WriteFailure {
                    kind: WriteKind::Retire,
                    block_id: Some(retired.clone()),
                    text: None,
                    message: err.to_string(),
                });
            }
        }
    }

    for stroke_id in &line.link_ids {
        match strokes.assign_block(*stroke_id, target) {
            AssignOutcome::Linked => report.associations_changed = true,
            AssignOutcome::Unchanged => {}
            AssignOutcome::Conflict { existing } => {
                log_warn!(
                    "stroke {} stays on block {} instead of moving to {}",
                    stroke_id,
                    existing,
                    target
                );
                report.conflicts.push(*stroke_id);
            }
            AssignOutcome::Missing => {
                log_debug!("stroke {} not in session, skipping link", stroke_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Point, Stroke, YBounds};
    use crate::reconcile::matcher::MatchTier;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records calls; fails creation for texts listed in `fail_on`.
    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<String>>,
        fail_on: Vec<String>,
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn list_blocks(&self, _page: &PageRef) -> Result<Vec<PersistedBlock>, StoreError> {
            Ok(Vec::new())
        }

        async fn create_block(&self, _page: &PageRef, block: NewBlock) -> Result<BlockId, StoreError> {
            if self.fail_on.contains(&block.text) {
                return Err(StoreError::Unavailable("offline".into()));
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push(format!("create:{}", block.text));
            Ok(BlockId(format!("new-{}", calls.len())))
        }

        async fn update_block(&self, id: &BlockId, update: BlockUpdate) -> Result<(), StoreError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("update:{}:{}", id, update.text));
            Ok(())
        }

        async fn delete_block(&self, id: &BlockId) -> Result<(), StoreError> {
            self.calls.lock().unwrap().push(format!("delete:{id}"));
            Ok(())
        }
    }

    fn page() -> PageRef {
        PageRef::new("7", 3)
    }

    fn collection(ids: &[i64]) -> StrokeCollection {
        let mut strokes = StrokeCollection::new();
        for id in ids {
            strokes.insert(Stroke::new(page(), vec![Point::new(0.0, 0.0, *id)]));
        }
        strokes
    }

    fn line(text: &str, ids: &[i64]) -> EstimatedLine {
        EstimatedLine::new(
            text,
            YBounds::new(0.0, 10.0),
            0,
            ids.iter().map(|i| StrokeId(*i)).collect(),
        )
    }

    fn block(id: &str) -> PersistedBlock {
        PersistedBlock {
            id: BlockId::from(id),
            text: "old".into(),
            canonical_key: Some("old".into()),
            bounds: Some(YBounds::new(0.0, 10.0)),
            indent_level: None,
            creation_order: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn failures_do_not_abort_the_batch() {
        let store = RecordingStore {
            fail_on: vec!["broken".into()],
            ..Default::default()
        };
        let mut strokes = collection(&[1, 2]);
        let plan = ReconcilePlan {
            actions: vec![
                ReconcileAction::Create { line: line("broken", &[1]) },
                ReconcileAction::Create { line: line("fine", &[2]) },
            ],
        };

        let report = apply_plan(&store, &page(), plan, &mut strokes).await;
        assert_eq!(report.created, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, WriteKind::Create);
        assert_eq!(strokes.get(StrokeId(1)).unwrap().block_id, None);
        assert!(strokes.get(StrokeId(2)).unwrap().block_id.is_some());
    }

    #[tokio::test]
    async fn linked_strokes_are_not_stolen() {
        let store = RecordingStore::default();
        let mut strokes = collection(&[1, 2]);
        strokes.assign_block(StrokeId(1), &BlockId::from("elsewhere"));
        let plan = ReconcilePlan {
            actions: vec![ReconcileAction::Update {
                line: line("new text", &[1, 2]),
                block: block("b1"),
                tier: MatchTier::Interval,
            }],
        };

        let report = apply_plan(&store, &page(), plan, &mut strokes).await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.conflicts, vec![StrokeId(1)]);
        assert_eq!(
            strokes.get(StrokeId(1)).unwrap().block_id,
            Some(BlockId::from("elsewhere"))
        );
        assert_eq!(strokes.get(StrokeId(2)).unwrap().block_id, Some(BlockId::from("b1")));
    }

    #[tokio::test]
    async fn only_owned_strokes_are_linked() {
        let store = RecordingStore::default();
        let mut strokes = collection(&[1, 2]);
        let mut upper = line("upper", &[1, 2]);
        upper.link_ids = [StrokeId(1)].into_iter().collect();
        let plan = ReconcilePlan {
            actions: vec![ReconcileAction::Create { line: upper }],
        };

        let report = apply_plan(&store, &page(), plan, &mut strokes).await;
        assert_eq!(report.created, 1);
        assert!(strokes.get(StrokeId(1)).unwrap().block_id.is_some());
        assert_eq!(strokes.get(StrokeId(2)).unwrap().block_id, None);
    }

    #[tokio::test]
    async fn orphans_are_reported_not_deleted() {
        let store = RecordingStore::default();
        let mut strokes = StrokeCollection::new();
        let plan = ReconcilePlan {
            actions: vec![ReconcileAction::Orphan { block: block("b9") }],
        };

        let report = apply_plan(&store, &page(), plan, &mut strokes).await;
        assert_eq!(report.orphaned.len(), 1);
        assert_eq!(report.store_writes(), 0);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn superseded_blocks_hand_strokes_over_then_retire() {
        let store = RecordingStore::default();
        let mut strokes = collection(&[1, 2, 3]);
        let b1 = BlockId::from("b1");
        let b2 = BlockId::from("b2");
        strokes.assign_block(StrokeId(1), &b1);
        strokes.assign_block(StrokeId(2), &b2);
        strokes.assign_block(StrokeId(3), &b2);

        let mut merged = line("old merged", &[1, 2, 3]);
        merged.block_id = Some(b1.clone());
        merged.supersedes = vec![b2.clone()];
        let plan = ReconcilePlan {
            actions: vec![ReconcileAction::Update {
                line: merged,
                block: block("b1"),
                tier: MatchTier::Explicit,
            }],
        };

        let report = apply_plan(&store, &page(), plan, &mut strokes).await;
        assert_eq!(report.retired, 1);
        assert_eq!(report.reassignments.len(), 2);
        assert!(report.conflicts.is_empty());
        assert_eq!(strokes.block_associations(&page())[&b1].len(), 3);
        assert_eq!(
            *store.calls.lock().unwrap(),
            vec!["update:b1:old merged".to_string(), "delete:b2".to_string()]
        );
    }
}
