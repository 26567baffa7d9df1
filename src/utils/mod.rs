//! Utility functions shared across the codebase

pub mod text;

// Re-export commonly used utilities
pub use text::{sanitize_report, strip_ansi_codes, truncate_chars};
