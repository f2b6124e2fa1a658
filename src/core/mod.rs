//! Core infrastructure: configuration, errors and run cancellation.

pub mod cancel;
pub mod config;
pub mod errors;
