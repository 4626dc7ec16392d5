use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::reconcile::DEFAULT_Y_TOLERANCE;

pub const ENV_Y_TOLERANCE: &str = "INKBRIDGE_Y_TOLERANCE";
pub const ENV_MATCH_RATIO: &str = "INKBRIDGE_MATCH_RATIO";
pub const ENV_HISTORY_DEPTH: &str = "INKBRIDGE_HISTORY_DEPTH";

/// Tunables for one reconciliation pass and the line editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    /// Slack added to vertical intervals when testing overlap.
    pub y_tolerance: f64,
    /// Tier-1 matches need strictly more than this share of a line's strokes.
    pub min_overlap_ratio: f64,
    /// Undo snapshots kept by the line editor.
    pub history_depth: usize,
    /// Knowledge-base namespace for smartpen pages.
    pub page_prefix: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            y_tolerance: DEFAULT_Y_TOLERANCE,
            min_overlap_ratio: 0.5,
            history_depth: 50,
            page_prefix: "Smartpen Data".into(),
        }
    }
}

impl SyncSettings {
    /// Reads settings from a JSON file. A missing file yields defaults; an unreadable
    /// or malformed one yields defaults with a warning.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = match serde_json::from_str::<SyncSettings>(&contents) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                Self::default()
            }
        };
        Ok(settings.sanitized())
    }

    /// Applies `INKBRIDGE_*` environment overrides; unparsable values are ignored.
    pub fn apply_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self.sanitized()
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_Y_TOLERANCE).and_then(|v| v.trim().parse().ok()) {
            self.y_tolerance = value;
        }
        if let Some(value) = lookup(ENV_MATCH_RATIO).and_then(|v| v.trim().parse().ok()) {
            self.min_overlap_ratio = value;
        }
        if let Some(value) = lookup(ENV_HISTORY_DEPTH).and_then(|v| v.trim().parse().ok()) {
            self.history_depth = value;
        }
    }

    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !self.y_tolerance.is_finite() || self.y_tolerance < 0.0 {
            warn!("y_tolerance {} out of range, using {}", self.y_tolerance, defaults.y_tolerance);
            self.y_tolerance = defaults.y_tolerance;
        }
        if !(0.0..1.0).contains(&self.min_overlap_ratio) {
            warn!(
                "min_overlap_ratio {} out of range, using {}",
                self.min_overlap_ratio, defaults.min_overlap_ratio
            );
            self.min_overlap_ratio = defaults.min_overlap_ratio;
        }
        if self.history_depth == 0 {
            self.history_depth = defaults.history_depth;
        }
        self
    }
}
