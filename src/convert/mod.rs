pub mod dispatcher;

pub use dispatcher::{Blocked, ConversionDispatcher, ConversionSummary, DispatchOutcome};
