//! Utility functions

pub mod path;
pub mod pool;

pub use path::normalize_path;
pub use pool::run_in_pool;
