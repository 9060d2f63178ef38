pub mod export;
pub mod sync;
