//! Reconciles handwritten smartpen strokes with the text blocks of a knowledge base.
//!
//! A save pass recognizes a page's strokes, estimates which strokes produced each
//! recognized line, matches lines to the blocks already on the page and writes only
//! what changed. [`sync::PageSync`] drives a pass; [`editor::LineEditor`] lets a user
//! merge or split lines before committing.

mod utils;

pub mod db;
pub mod editor;
pub mod models;
pub mod recognition;
pub mod reconcile;
pub mod settings;
pub mod store;
pub mod sync;

pub use db::Database;
pub use settings::SyncSettings;
pub use store::{DocumentStore, StoreError, StrokeStore};
pub use sync::{OrphanReport, PageSync, SyncReport};
pub use utils::logging::init_logging;
