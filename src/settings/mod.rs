pub mod manager;
pub mod model;
pub mod store;

pub use model::{ConversionSettings, ImageFormat};
pub use store::SettingsStore;
