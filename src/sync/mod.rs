//! One page's save pipeline.
//!
//! A pass runs in two phases: block writes against the document store, then the
//! stroke snapshot (carrying the new block links) against the stroke store. Each
//! phase is attempted even if the other partly failed. A failed phase 2 leaves a
//! state that a plain re-run repairs, because matching is idempotent for unchanged
//! input. Callers serialize passes per page; different pages may run concurrently.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::editor::{plan_commit, EditorLine, LineEditor};
use crate::models::{BlockId, PageRef, Recognition, Stroke, StrokeCollection, StrokeId};
use crate::recognition::{recognize_or_empty, Recognizer};
use crate::reconcile::{
    apply_plan, compute_change_set, estimate_lines, match_blocks, ChangeSet, ExecutionReport,
    ReconcilePlan,
};
use crate::settings::SyncSettings;
use crate::store::{DocumentStore, StrokeStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};


#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub page: PageRef,
    /// Knowledge-base page the blocks live on, e.g. `Smartpen Data/B3017/P42`.
    pub page_title: String,
    pub execution: ExecutionReport,
    /// False when the snapshot was already current or the write failed.
    pub strokes_persisted: bool,
    pub stroke_write_error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanReport {
    pub deleted: Vec<BlockId>,
    /// Strokes whose link to a deleted block was cleared. Active ones are linked
    /// again by the next pass.
    pub released: Vec<StrokeId>,
    pub failed: Vec<(BlockId, String)>,
    pub strokes_persisted: bool,
    pub stroke_write_error: Option<String>,
}

/// Context for reconciling a single page: the page plus its store handles.
pub struct PageSync<'a, D: ?Sized, S: ?Sized> {
    page: PageRef,
    documents: &'a D,
    stroke_store: &'a S,
    settings: &'a SyncSettings,
}

impl<'a, D, S> PageSync<'a, D, S>
where
    D: DocumentStore + ?Sized,
    S: StrokeStore + ?Sized,
{
    pub fn new(
        page: PageRef,
        documents: &'a D,
        stroke_store: &'a S,
        settings: &'a SyncSettings,
    ) -> Self {
        Self {
            page,
            documents,
            stroke_store,
            settings,
        }
    }

    pub fn page(&self) -> &PageRef {
        &self.page
    }

    pub fn page_title(&self) -> String {
        self.page.page_name(&self.settings.page_prefix)
    }

    /// Loads the persisted strokes for this page into the session.
    pub async fn restore(&self, strokes: &mut StrokeCollection) -> Result<usize> {
        let stored = self
            .stroke_store
            .load_strokes(&self.page)
            .await
            .with_context(|| format!("failed to load strokes for {}", self.page))?;
        let added = strokes.restore(&self.page, stored);
        log_info!("restored {} strokes for {}", added, self.page);
        Ok(added)
    }

    /// Computes the action list for a recognition batch without writing anything.
    pub async fn plan(
        &self,
        strokes: &StrokeCollection,
        recognition: &Recognition,
    ) -> Result<ReconcilePlan> {
        let blocks = self
            .documents
            .list_blocks(&self.page)
            .await
            .with_context(|| format!("failed to list blocks for {}", self.page))?;

        let active = strokes.active_on(&self.page);
        let lines = estimate_lines(recognition, &active, self.settings.y_tolerance);
        let associations = strokes.block_associations(&self.page);
        let plan = match_blocks(&blocks, lines, &associations, self.settings);

        let counts = plan.counts();
        log_debug!(
            "plan for {}: skip={} update={} create={} orphan={}",
            self.page,
            counts.skip,
            counts.update,
            counts.create,
            counts.orphan
        );
        Ok(plan)
    }

    /// Full reconciliation pass for an already-recognized batch.
    pub async fn save(
        &self,
        strokes: &mut StrokeCollection,
        recognition: &Recognition,
    ) -> Result<SyncReport> {
        let plan = self.plan(strokes, recognition).await?;
        Ok(self.execute(plan, strokes).await)
    }

    /// Recognizes the page's active strokes, then reconciles. Recognition failures
    /// reconcile as an empty batch, which only ever yields orphans.
    pub async fn save_with<R>(
        &self,
        strokes: &mut StrokeCollection,
        recognizer: &R,
    ) -> Result<SyncReport>
    where
        R: Recognizer + ?Sized,
    {
        let batch: Vec<Stroke> = strokes.active_on(&self.page).into_iter().cloned().collect();
        let recognition = recognize_or_empty(recognizer, &batch).await;
        self.save(strokes, &recognition).await
    }

    /// Seeds a line editor with the current matches for `recognition`.
    pub async fn open_editor(
        &self,
        strokes: &StrokeCollection,
        recognition: &Recognition,
    ) -> Result<LineEditor> {
        let plan = self.plan(strokes, recognition).await?;
        Ok(LineEditor::from_plan(
            &plan,
            strokes.active_on(&self.page),
            self.settings.history_depth,
        ))
    }

    /// Applies the editor's result, retiring merged-away blocks after their strokes
    /// move to the surviving block.
    pub async fn commit_edits(
        &self,
        strokes: &mut StrokeCollection,
        lines: Vec<EditorLine>,
    ) -> Result<SyncReport> {
        let blocks = self
            .documents
            .list_blocks(&self.page)
            .await
            .with_context(|| format!("failed to list blocks for {}", self.page))?;
        let plan = plan_commit(lines, &blocks);
        Ok(self.execute(plan, strokes).await)
    }

    /// Deletes caller-confirmed orphan blocks.
    ///
    /// Strokes still linked to a deleted block are released back to unlinked, then
    /// the snapshot is re-persisted.
    pub async fn confirm_orphans(
        &self,
        strokes: &mut StrokeCollection,
        confirmed: &[BlockId],
    ) -> Result<OrphanReport> {
        let mut report = OrphanReport::default();

        for id in confirmed {
            match self.documents.delete_block(id).await {
                Ok(()) => {
                    let released = strokes.clear_block(&self.page, id);
                    if !released.is_empty() {
                        log_info!("released {} strokes from deleted block {}", released.len(), id);
                    }
                    report.released.extend(released);
                    report.deleted.push(id.clone());
                }
                Err(err) => {
                    log_error!("failed to delete orphan block {id}: {err}");
                    report.failed.push((id.clone(), err.to_string()));
                }
            }
        }

        let (persisted, error) = self
            .persist_strokes(strokes, !report.released.is_empty())
            .await;
        report.strokes_persisted = persisted;
        report.stroke_write_error = error;
        Ok(report)
    }

    /// Net stroke additions and deletions since the last persisted snapshot.
    pub async fn pending_changes(&self, strokes: &StrokeCollection) -> Result<ChangeSet> {
        let persisted = self
            .stroke_store
            .load_strokes(&self.page)
            .await
            .with_context(|| format!("failed to load strokes for {}", self.page))?;
        Ok(compute_change_set(&strokes.active_on(&self.page), &persisted))
    }

    async fn execute(&self, plan: ReconcilePlan, strokes: &mut StrokeCollection) -> SyncReport {
        let execution = apply_plan(self.documents, &self.page, plan, strokes).await;
        let (strokes_persisted, stroke_write_error) = self
            .persist_strokes(strokes, execution.associations_changed)
            .await;

        let page_title = self.page_title();
        if !execution.is_clean() {
            log_warn!(
                "{} finished with {} failed writes",
                page_title,
                execution.failures.len()
            );
        }

        SyncReport {
            page: self.page.clone(),
            page_title,
            execution,
            strokes_persisted,
            stroke_write_error,
        }
    }

    /// Phase 2. Writes the page snapshot when links changed or it differs from
    /// what is stored; an unchanged session writes nothing.
    async fn persist_strokes(
        &self,
        strokes: &StrokeCollection,
        links_changed: bool,
    ) -> (bool, Option<String>) {
        let snapshot = strokes.stored_snapshot(&self.page);

        if !links_changed {
            match self.stroke_store.load_strokes(&self.page).await {
                Ok(persisted) if persisted == snapshot => {
                    log_debug!("stroke snapshot for {} already current", self.page);
                    return (false, None);
                }
                Ok(_) => {}
                Err(err) => log_warn!("could not compare stroke snapshot for {}: {err}", self.page),
            }
        }

        let count = snapshot.len();
        match self.stroke_store.save_strokes(&self.page, snapshot).await {
            Ok(()) => {
                log_info!("persisted {} strokes for {}", count, self.page);
                (true, None)
            }
            Err(err) => {
                log_error!("failed to persist strokes for {}: {err}", self.page);
                (false, Some(err.to_string()))
            }
        }
    }
}
