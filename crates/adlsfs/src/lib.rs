//! adlsfs - a filesystem contract over hierarchical-namespace cloud storage
//!
//! Paths, listings, streams and directory operations are translated into
//! calls against a Data Lake Storage Gen2 style API. Set ADLSFS_LOG to
//! control logging (see the diagnostics crate):
//! - ADLSFS_LOG=off (default) - silent
//! - ADLSFS_LOG=info - directory mutations, moves, commits
//! - ADLSFS_LOG=debug - every backend call with the timeout applied

/// Error taxonomy
pub mod error;

/// Path parsing and normalization
pub mod path;

/// Per-category timeouts shared by a handler
pub mod timeouts;

/// Content settings accepted by output streams
pub mod content;

// Backend collaborator and its implementations
pub mod backend;
pub mod memory;
pub mod rest;

/// Backend failure translation
pub mod mapper;

pub mod config;

// Filesystem contract and its components
pub mod handler;
pub mod metadata;
pub mod reader;
pub mod writer;
mod directory;

// Handler variants
pub mod account;
pub mod filesystem;

pub use account::AccountHandler;
pub use backend::{BackendError, DataLakeBackend};
pub use config::AdapterConfig;
pub use content::ContentSettings;
pub use error::{Error, ErrorKind, Result};
pub use filesystem::FilesystemHandler;
pub use handler::{FileInfo, FileSelector, FileSystem, FileType, HandlerOptions};
pub use memory::MemoryBackend;
pub use metadata::Listing;
pub use reader::InputStream;
pub use rest::{Credential, RestBackend, StaticToken, TokenProvider};
pub use timeouts::{OperationKind, SharedTimeouts, Timeouts};
pub use writer::OutputStream;
