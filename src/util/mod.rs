//! Utility modules

pub mod format;
pub mod fs;

pub use format::{format_bytes, format_grouped, format_number, format_rate};
pub use fs::{remove_if_exists, PartialFile};
