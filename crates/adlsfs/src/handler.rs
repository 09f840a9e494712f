//! The generic filesystem contract and the state shared by its two
//! implementations.
//!
//! [`AccountHandler`](crate::AccountHandler) spans every filesystem in a
//! storage account; [`FilesystemHandler`](crate::FilesystemHandler) is
//! pinned to one. Both hold a [`Context`] and delegate to the metadata,
//! directory and stream components, which differ only through the
//! [`PathResolver`] in the context.

use crate::backend::{BackendResult, DataLakeBackend, PathProperties};
use crate::error::Result;
use crate::mapper::{CallContext, ErrorMapper};
use crate::metadata::Listing;
use crate::path::{DataLakePath, Key, PathResolver};
use crate::reader::InputStream;
use crate::timeouts::{OperationKind, SharedTimeouts};
use crate::writer::OutputStream;
use chrono::{DateTime, Utc};
use diagnostics::emit::debug;
use std::sync::Arc;
use std::time::Duration;

/// Default writer block size: bytes buffered before an append is issued
pub const DEFAULT_BLOCK_SIZE: usize = 5 * 1024 * 1024;

/// Default read-ahead of input streams
pub const DEFAULT_READ_AHEAD: usize = 1024 * 1024;

/// Tuning knobs fixed for the lifetime of a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerOptions {
    pub block_size: usize,
    pub read_ahead: usize,
    /// `maxResults` requested per listing page; `None` uses the service default
    pub page_size: Option<usize>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            read_ahead: DEFAULT_READ_AHEAD,
            page_size: None,
        }
    }
}

/// Everything a component needs to issue backend calls for a handler.
#[derive(Clone)]
pub(crate) struct Context {
    pub backend: Arc<dyn DataLakeBackend>,
    pub timeouts: SharedTimeouts,
    pub options: HandlerOptions,
    pub resolver: PathResolver,
}

impl Context {
    pub fn resolve(&self, raw: &str) -> Result<DataLakePath> {
        self.resolver.resolve(raw)
    }

    /// Caller-visible spelling of `key` in `scope`
    pub fn display(&self, scope: Option<&str>, key: &Key) -> String {
        self.resolver.display(scope, key)
    }

    /// Issues one backend call.
    ///
    /// The timeout is read from the shared cells here, right before the
    /// call, and any failure is translated for `path`.
    pub fn call<T, F>(
        &self,
        kind: OperationKind,
        context: CallContext,
        operation: &'static str,
        path: &str,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce(&dyn DataLakeBackend, Option<Duration>) -> BackendResult<T>,
    {
        let timeout = self.timeouts.get(kind);
        let category = kind.name();
        let timeout_text = timeout.map_or_else(|| "default".to_string(), |t| format!("{t:?}"));
        debug!("{operation} {path} ({category}, timeout {timeout_text})");
        f(self.backend.as_ref(), timeout).map_err(|e| ErrorMapper::map(e, path, context))
    }

    /// Properties of `key`, `None` when it does not exist
    pub fn lookup(&self, scope: &str, key: &Key, shown: &str) -> Result<Option<PathProperties>> {
        let name = key.as_backend_name();
        let found = self.call(
            OperationKind::Metadata,
            CallContext::Lookup,
            "get_properties",
            shown,
            |b, t| b.get_properties(scope, &name, t),
        );
        match found {
            Ok(props) => Ok(Some(props)),
            Err(e) if e.kind() == crate::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// True when the filesystem `scope` exists
    pub fn scope_exists(&self, scope: &str, shown: &str) -> Result<bool> {
        let found = self.call(
            OperationKind::Metadata,
            CallContext::Lookup,
            "get_filesystem_properties",
            shown,
            |b, t| b.get_filesystem_properties(scope, t),
        );
        match found {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == crate::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    File,
    Directory,
    NotFound,
}

/// Result of a stat or one listing entry. `NotFound` is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: String,
    pub file_type: FileType,
    /// Bytes, files only
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

impl FileInfo {
    #[must_use]
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            file_type: FileType::NotFound,
            size: None,
            modified: None,
        }
    }

    #[must_use]
    pub fn directory<S: Into<String>>(path: S, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            path: path.into(),
            file_type: FileType::Directory,
            size: None,
            modified,
        }
    }

    pub(crate) fn from_properties(path: String, props: &PathProperties) -> Self {
        if props.is_directory() {
            return Self::directory(path, props.last_modified);
        }
        Self {
            path,
            file_type: FileType::File,
            size: Some(props.content_length),
            modified: props.last_modified,
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.file_type != FileType::NotFound
    }

    /// Final path component
    #[must_use]
    pub fn base_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }
}

/// Listing request: base directory, recursion, and tolerance of a missing base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelector {
    pub base_dir: String,
    pub recursive: bool,
    pub allow_not_found: bool,
}

impl FileSelector {
    #[must_use]
    pub fn new<S: Into<String>>(base_dir: S) -> Self {
        Self {
            base_dir: base_dir.into(),
            recursive: false,
            allow_not_found: false,
        }
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn allow_not_found(mut self, allow: bool) -> Self {
        self.allow_not_found = allow;
        self
    }
}

/// Filesystem capability set exposed to dataset tooling.
///
/// All methods block on network calls. Handlers are `Send + Sync`;
/// independent operations may run concurrently through one handler.
pub trait FileSystem: Send + Sync {
    /// `abfs+{account}` or `abfs+{account}/{filesystem}`
    fn type_name(&self) -> String;

    /// The timeout cells every call from this handler consults
    fn timeouts(&self) -> &SharedTimeouts;

    fn get_file_info(&self, path: &str) -> Result<FileInfo>;

    fn get_file_infos(&self, paths: &[&str]) -> Result<Vec<FileInfo>> {
        paths.iter().map(|p| self.get_file_info(p)).collect()
    }

    /// Lazy listing; pages are fetched as the iterator is consumed.
    fn get_file_info_selector(&self, selector: &FileSelector) -> Result<Listing>;

    fn create_dir(&self, path: &str, recursive: bool) -> Result<()>;

    fn delete_dir(&self, path: &str, recursive: bool) -> Result<()>;

    /// Removes every entry under `path` but keeps the directory. The root
    /// of a filesystem is refused unless `accept_root` is set.
    fn delete_dir_contents(&self, path: &str, accept_root: bool) -> Result<()>;

    fn delete_file(&self, path: &str) -> Result<()>;

    /// Renames `src` to `dst`; an existing destination file is an error.
    fn move_path(&self, src: &str, dst: &str) -> Result<()> {
        self.move_with(src, dst, false)
    }

    /// Renames `src` to `dst`, replacing a destination file when `overwrite`.
    fn move_with(&self, src: &str, dst: &str, overwrite: bool) -> Result<()>;

    fn copy_file(&self, src: &str, dst: &str) -> Result<()>;

    /// Sequential reader; existence is checked on first use.
    fn open_input_stream(&self, path: &str) -> Result<InputStream>;

    /// Random-access reader with its size fetched up front.
    fn open_input_file(&self, path: &str) -> Result<InputStream>;

    /// Writer whose content replaces `path` atomically on close.
    fn open_output_stream(&self, path: &str, metadata: &[(&str, &str)]) -> Result<OutputStream>;

    /// Writer that continues at the current end of `path`, creating it if missing.
    fn open_append_stream(&self, path: &str, metadata: &[(&str, &str)]) -> Result<OutputStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_builder() {
        let selector = FileSelector::new("fs/dir").recursive(true);
        assert!(selector.recursive);
        assert!(!selector.allow_not_found);
        assert!(FileSelector::new("").allow_not_found(true).allow_not_found);
    }

    #[test]
    fn test_file_info_helpers() {
        let info = FileInfo::not_found("fs/a/b.parquet");
        assert!(!info.exists());
        assert_eq!(info.base_name(), "b.parquet");
        assert!(FileInfo::directory("fs", None).is_dir());
        assert_eq!(FileInfo::directory("", None).base_name(), "");
    }
}
