pub mod commit;
pub mod state;

pub use commit::plan_commit;
pub use state::{EditorError, EditorLine, LineEditor};
