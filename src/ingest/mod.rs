pub mod gate;
pub mod pipeline;
pub mod scanner;
pub mod url;

pub use gate::{DropGate, DROP_COOLDOWN};
pub use pipeline::{BatchReport, DragDropEvent, DropOutcome, IngestPipeline, UrlDialog};
