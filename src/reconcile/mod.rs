pub mod canonical;
pub mod changeset;
pub mod estimate;
pub mod executor;
pub mod geometry;
pub mod matcher;

pub use canonical::canonicalize;
pub use changeset::{compute_change_set, ChangeSet};
pub use estimate::{assign_link_owners, estimate_lines, estimate_stroke_ids};
pub use executor::{apply_plan, ExecutionReport, WriteFailure};
pub use geometry::{strokes_overlapping, DEFAULT_Y_TOLERANCE};
pub use matcher::{match_blocks, MatchTier, ReconcileAction, ReconcilePlan};
