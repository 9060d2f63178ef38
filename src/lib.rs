pub mod core;
pub mod features;
pub mod scanner;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::AppState;

pub use features::{export, sync};
