//! Pure helper functions shared across the domain

pub mod text;

pub use text::{truncate_message, TruncateExt};
