//! Storage service collaborator trait.
//!
//! A [`DataLakeBackend`] speaks the hierarchical-namespace API: paginated
//! path listings, property lookups, create, append-then-flush writes,
//! ranged reads, rename and delete. Every call is synchronous and receives
//! the timeout the adapter selected for its category; `None` means the
//! backend default applies.
//!
//! Failures are reported as [`BackendError`] and never leave the crate:
//! the adapter funnels each one through [`crate::mapper::ErrorMapper`].

use crate::content::ContentSettings;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Failure as reported by the service or its transport
#[derive(Debug)]
pub struct BackendError {
    /// HTTP status, when the service answered
    pub status: Option<u16>,
    /// Service error code (`PathNotFound`, `DirectoryNotEmpty`, ...)
    pub code: Option<String>,
    pub message: String,
    /// Deadline exceeded in the transport
    pub timed_out: bool,
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "{status} {code}: {}", self.message),
            (Some(status), None) => write!(f, "{status}: {}", self.message),
            (None, Some(code)) => write!(f, "{code}: {}", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl BackendError {
    pub fn service<C: Into<String>, M: Into<String>>(status: u16, code: C, message: M) -> Self {
        Self {
            status: Some(status),
            code: Some(code.into()),
            message: message.into(),
            timed_out: false,
            source: None,
        }
    }

    pub fn timeout<M: Into<String>>(message: M) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
            timed_out: true,
            source: None,
        }
    }

    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            status: None,
            code: None,
            message: err.to_string(),
            timed_out: false,
            source: Some(Box::new(err)),
        }
    }

    #[must_use]
    pub fn with_source(
        mut self,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    ) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    File,
    Directory,
}

/// Properties of one path, from a lookup or a listing
#[derive(Debug, Clone, PartialEq)]
pub struct PathProperties {
    /// Full name within the filesystem, `a/b/c`
    pub name: String,
    pub resource: ResourceType,
    pub content_length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content: ContentSettings,
}

impl PathProperties {
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.resource == ResourceType::Directory
    }
}

/// A filesystem (container) in the account
#[derive(Debug, Clone, PartialEq)]
pub struct FilesystemItem {
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page; `None` on the last page
    pub continuation: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            continuation: None,
        }
    }
}

/// Arguments of a path listing call
#[derive(Debug, Clone, Copy)]
pub struct ListRequest<'a> {
    pub filesystem: &'a str,
    /// Directory to list, empty for the filesystem root
    pub directory: &'a str,
    pub recursive: bool,
    pub continuation: Option<&'a str>,
    pub max_results: Option<usize>,
}

pub trait DataLakeBackend: Send + Sync {
    /// Storage account this backend talks to
    fn account_name(&self) -> &str;

    fn list_filesystems(
        &self,
        continuation: Option<&str>,
        timeout: Option<Duration>,
    ) -> BackendResult<Page<FilesystemItem>>;

    fn get_filesystem_properties(
        &self,
        filesystem: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<FilesystemItem>;

    fn create_filesystem(&self, filesystem: &str, timeout: Option<Duration>) -> BackendResult<()>;

    fn delete_filesystem(&self, filesystem: &str, timeout: Option<Duration>) -> BackendResult<()>;

    fn list_paths(
        &self,
        request: &ListRequest<'_>,
        timeout: Option<Duration>,
    ) -> BackendResult<Page<PathProperties>>;

    fn get_properties(
        &self,
        filesystem: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<PathProperties>;

    /// Creates an empty file, implicitly creating parent directories.
    /// Without `overwrite` an existing path is a conflict.
    fn create_file(
        &self,
        filesystem: &str,
        path: &str,
        overwrite: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()>;

    /// Creates a directory and any missing parents; existing directories are kept.
    fn create_directory(
        &self,
        filesystem: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<()>;

    /// Stages `data` at `offset`. Staged bytes stay invisible until [`flush`].
    ///
    /// [`flush`]: DataLakeBackend::flush
    fn append(
        &self,
        filesystem: &str,
        path: &str,
        offset: u64,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> BackendResult<()>;

    /// Commits staged bytes so the file is exactly `position` bytes long and
    /// applies `content` when it is not empty.
    fn flush(
        &self,
        filesystem: &str,
        path: &str,
        position: u64,
        content: &ContentSettings,
        timeout: Option<Duration>,
    ) -> BackendResult<()>;

    /// Reads up to `len` committed bytes from `offset`. A short or empty
    /// result means end of file.
    fn read(
        &self,
        filesystem: &str,
        path: &str,
        offset: u64,
        len: u64,
        timeout: Option<Duration>,
    ) -> BackendResult<Bytes>;

    fn rename(
        &self,
        source_filesystem: &str,
        source: &str,
        dest_filesystem: &str,
        dest: &str,
        overwrite: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()>;

    fn delete(
        &self,
        filesystem: &str,
        path: &str,
        recursive: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()>;
}
