//! Command-line access to a Data Lake account through the adlsfs handlers.

pub mod commands;
pub mod common;
