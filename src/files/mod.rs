pub mod sync;

pub use sync::{FileListSync, ListSnapshot};
