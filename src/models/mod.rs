pub mod block;
pub mod line;
pub mod page;
pub mod stroke;

pub use block::{BlockId, BlockUpdate, NewBlock, PersistedBlock};
pub use line::{EstimatedLine, Recognition, RecognizedLine};
pub use page::PageRef;
pub use stroke::{
    AssignOutcome, Point, Reassignment, StoredPoint, StoredStroke, Stroke, StrokeCollection,
    StrokeId, YBounds,
};
