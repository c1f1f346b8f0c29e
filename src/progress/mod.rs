pub mod model;
pub mod reducer;

pub use model::{ConversionStatus, FileView};
pub use reducer::ProgressReducer;
