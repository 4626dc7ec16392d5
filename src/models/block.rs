use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::YBounds;

/// Opaque document-store block identifier (a UUID for the local store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A text block as listed by the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedBlock {
    pub id: BlockId,
    /// Current content, possibly edited by the user outside this system.
    pub text: String,
    /// Canonical key of the recognizer text written at create/update time.
    pub canonical_key: Option<String>,
    /// Written once at creation; `None` for blocks that never came from strokes.
    pub bounds: Option<YBounds>,
    pub indent_level: Option<u32>,
    /// Monotonic per-store creation sequence; lower is older.
    pub creation_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedBlock {
    /// Stored key, falling back to the current text for blocks created without one.
    pub fn comparison_key(&self) -> String {
        match &self.canonical_key {
            Some(key) => key.clone(),
            None => crate::reconcile::canonicalize(&self.text),
        }
    }
}

/// Payload for a block creation; the only time `bounds` is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlock {
    pub text: String,
    pub canonical_key: String,
    pub bounds: YBounds,
    pub indent_level: u32,
}

/// Text-only change. Carries no geometry so an update cannot move a block's bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUpdate {
    pub text: String,
    pub canonical_key: String,
}
