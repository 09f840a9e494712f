//! In-process hierarchical namespace.
//!
//! Mirrors the service semantics the adapter depends on: directories are
//! real entries, appended bytes stay invisible until a flush at the exact
//! end position, listings are paginated in segment order, and parents are
//! created implicitly by file and directory creation.
//!
//! For tests it also records every call with the timeout it received,
//! can simulate latency (a call whose timeout is shorter than the latency
//! fails as timed out without sleeping), and can fail the next call of a
//! given operation with an injected error.

use crate::backend::{
    BackendError, BackendResult, DataLakeBackend, FilesystemItem, ListRequest, Page,
    PathProperties, ResourceType,
};
use crate::content::ContentSettings;
use crate::path::Key;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Page size used when none is configured, matching the service maximum
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub operation: &'static str,
    pub timeout: Option<Duration>,
}

struct Entry {
    resource: ResourceType,
    data: Vec<u8>,
    staged: Vec<u8>,
    modified: DateTime<Utc>,
    content: ContentSettings,
}

impl Entry {
    fn new(resource: ResourceType) -> Self {
        Self {
            resource,
            data: Vec::new(),
            staged: Vec::new(),
            modified: Utc::now(),
            content: ContentSettings::default(),
        }
    }

    fn properties(&self, key: &Key) -> PathProperties {
        PathProperties {
            name: key.as_backend_name(),
            resource: self.resource,
            content_length: self.data.len() as u64,
            last_modified: Some(self.modified),
            content: self.content.clone(),
        }
    }
}

struct Filesystem {
    modified: DateTime<Utc>,
    entries: BTreeMap<Key, Entry>,
}

impl Filesystem {
    fn new() -> Self {
        Self {
            modified: Utc::now(),
            entries: BTreeMap::new(),
        }
    }

    fn has_children(&self, dir: &Key) -> bool {
        self.entries
            .range((Bound::Excluded(dir.clone()), Bound::Unbounded))
            .next()
            .is_some_and(|(k, _)| k.starts_with(dir))
    }

    /// Creates missing ancestors of `key` as directories; fails when one is a file.
    fn ensure_parents(&mut self, key: &Key) -> BackendResult<()> {
        let mut ancestors = Vec::new();
        let mut current = key.parent();
        while let Some(parent) = current {
            if parent.is_root() {
                break;
            }
            current = parent.parent();
            ancestors.push(parent);
        }
        for ancestor in ancestors.into_iter().rev() {
            match self.entries.get(&ancestor) {
                Some(entry) if entry.resource == ResourceType::File => {
                    return Err(BackendError::service(
                        409,
                        "PathConflict",
                        format!("{ancestor} is a file"),
                    ));
                }
                Some(_) => {}
                None => {
                    _ = self
                        .entries
                        .insert(ancestor, Entry::new(ResourceType::Directory));
                }
            }
        }
        Ok(())
    }

    fn entry(&self, key: &Key) -> BackendResult<&Entry> {
        self.entries.get(key).ok_or_else(|| path_not_found(key))
    }

    fn entry_mut(&mut self, key: &Key) -> BackendResult<&mut Entry> {
        self.entries.get_mut(key).ok_or_else(|| path_not_found(key))
    }

    fn file_mut(&mut self, key: &Key) -> BackendResult<&mut Entry> {
        let entry = self.entry_mut(key)?;
        if entry.resource != ResourceType::File {
            return Err(BackendError::service(
                400,
                "InvalidResourceType",
                format!("{key} is a directory"),
            ));
        }
        Ok(entry)
    }

    fn take_subtree(&mut self, root: &Key) -> Vec<(Key, Entry)> {
        let keys: Vec<Key> = self
            .entries
            .range(root.clone()..)
            .take_while(|(k, _)| k.starts_with(root))
            .map(|(k, _)| k.clone())
            .collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k).map(|e| (k, e)))
            .collect()
    }
}

fn path_not_found(key: &Key) -> BackendError {
    BackendError::service(
        404,
        "PathNotFound",
        format!("The specified path does not exist: {key}"),
    )
}

fn filesystem_not_found(name: &str) -> BackendError {
    BackendError::service(
        404,
        "FilesystemNotFound",
        format!("The specified filesystem does not exist: {name}"),
    )
}

fn root_not_allowed(operation: &str) -> BackendError {
    BackendError::service(
        400,
        "InvalidInput",
        format!("{operation} is not supported on the filesystem root"),
    )
}

struct State {
    filesystems: BTreeMap<String, Filesystem>,
    calls: Vec<Call>,
    failures: Vec<(&'static str, BackendError)>,
    latency: Option<Duration>,
    page_size: usize,
}

impl State {
    fn filesystem(&self, name: &str) -> BackendResult<&Filesystem> {
        self.filesystems
            .get(name)
            .ok_or_else(|| filesystem_not_found(name))
    }

    fn filesystem_mut(&mut self, name: &str) -> BackendResult<&mut Filesystem> {
        self.filesystems
            .get_mut(name)
            .ok_or_else(|| filesystem_not_found(name))
    }
}

pub struct MemoryBackend {
    account: String,
    state: Mutex<State>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new<S: Into<String>>(account: S) -> Self {
        Self {
            account: account.into(),
            state: Mutex::new(State {
                filesystems: BTreeMap::new(),
                calls: Vec::new(),
                failures: Vec::new(),
                latency: None,
                page_size: DEFAULT_PAGE_SIZE,
            }),
        }
    }

    #[must_use]
    pub fn with_page_size(self, page_size: usize) -> Self {
        self.set_page_size(page_size);
        self
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.lock().page_size = page_size.max(1);
    }

    /// Simulated service latency; calls with a shorter timeout fail as timed out.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Fails the next call of `operation` (the trait method name) with `error`.
    pub fn inject_failure(&self, operation: &'static str, error: BackendError) {
        self.lock().failures.push((operation, error));
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Timeout received by the most recent call of `operation`
    #[must_use]
    pub fn last_timeout(&self, operation: &str) -> Option<Option<Duration>> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|c| c.operation == operation)
            .map(|c| c.timeout)
    }

    /// Bytes appended to `path` but not yet flushed
    #[must_use]
    pub fn staged_len(&self, filesystem: &str, path: &str) -> Option<usize> {
        let state = self.lock();
        let fs = state.filesystems.get(filesystem)?;
        fs.entries
            .get(&Key::from_backend_name(path))
            .map(|e| e.staged.len())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(
        &self,
        operation: &'static str,
        timeout: Option<Duration>,
    ) -> BackendResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(Call { operation, timeout });

        if let Some(pos) = state.failures.iter().position(|(op, _)| *op == operation) {
            let (_, error) = state.failures.remove(pos);
            return Err(error);
        }

        if let (Some(latency), Some(timeout)) = (state.latency, timeout)
            && latency > timeout
        {
            return Err(BackendError::timeout(format!(
                "{operation} exceeded its deadline of {timeout:?}"
            )));
        }
        Ok(state)
    }
}

impl DataLakeBackend for MemoryBackend {
    fn account_name(&self) -> &str {
        &self.account
    }

    fn list_filesystems(
        &self,
        continuation: Option<&str>,
        timeout: Option<Duration>,
    ) -> BackendResult<Page<FilesystemItem>> {
        let state = self.begin("list_filesystems", timeout)?;
        let lower = match continuation {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Unbounded,
        };
        let mut items: Vec<FilesystemItem> = state
            .filesystems
            .range((lower, Bound::Unbounded))
            .take(state.page_size + 1)
            .map(|(name, fs)| FilesystemItem {
                name: name.clone(),
                last_modified: Some(fs.modified),
            })
            .collect();

        let continuation = if items.len() > state.page_size {
            items.truncate(state.page_size);
            items.last().map(|fs| fs.name.clone())
        } else {
            None
        };
        Ok(Page {
            items,
            continuation,
        })
    }

    fn get_filesystem_properties(
        &self,
        filesystem: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<FilesystemItem> {
        let state = self.begin("get_filesystem_properties", timeout)?;
        let fs = state.filesystem(filesystem)?;
        Ok(FilesystemItem {
            name: filesystem.to_string(),
            last_modified: Some(fs.modified),
        })
    }

    fn create_filesystem(&self, filesystem: &str, timeout: Option<Duration>) -> BackendResult<()> {
        let mut state = self.begin("create_filesystem", timeout)?;
        if state.filesystems.contains_key(filesystem) {
            return Err(BackendError::service(
                409,
                "FilesystemAlreadyExists",
                format!("The specified filesystem already exists: {filesystem}"),
            ));
        }
        _ = state
            .filesystems
            .insert(filesystem.to_string(), Filesystem::new());
        Ok(())
    }

    fn delete_filesystem(&self, filesystem: &str, timeout: Option<Duration>) -> BackendResult<()> {
        let mut state = self.begin("delete_filesystem", timeout)?;
        state
            .filesystems
            .remove(filesystem)
            .map(|_| ())
            .ok_or_else(|| filesystem_not_found(filesystem))
    }

    fn list_paths(
        &self,
        request: &ListRequest<'_>,
        timeout: Option<Duration>,
    ) -> BackendResult<Page<PathProperties>> {
        let state = self.begin("list_paths", timeout)?;
        let fs = state.filesystem(request.filesystem)?;
        let dir = Key::from_backend_name(request.directory);
        if !dir.is_root() && fs.entry(&dir)?.resource != ResourceType::Directory {
            return Err(BackendError::service(
                400,
                "PathIsNotDirectory",
                format!("{dir} is not a directory"),
            ));
        }

        let limit = request
            .max_results
            .map_or(state.page_size, |m| m.clamp(1, state.page_size));
        let lower = match request.continuation {
            Some(token) => Key::from_backend_name(token),
            None => dir.clone(),
        };
        let depth = dir.segments().len() + 1;
        let mut items: Vec<PathProperties> = fs
            .entries
            .range((Bound::Excluded(lower), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(&dir))
            .filter(|(k, _)| request.recursive || k.segments().len() == depth)
            .take(limit + 1)
            .map(|(k, e)| e.properties(k))
            .collect();

        let continuation = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|p| p.name.clone())
        } else {
            None
        };
        Ok(Page {
            items,
            continuation,
        })
    }

    fn get_properties(
        &self,
        filesystem: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<PathProperties> {
        let state = self.begin("get_properties", timeout)?;
        let fs = state.filesystem(filesystem)?;
        let key = Key::from_backend_name(path);
        if key.is_root() {
            return Ok(PathProperties {
                name: String::new(),
                resource: ResourceType::Directory,
                content_length: 0,
                last_modified: Some(fs.modified),
                content: ContentSettings::default(),
            });
        }
        Ok(fs.entry(&key)?.properties(&key))
    }

    fn create_file(
        &self,
        filesystem: &str,
        path: &str,
        overwrite: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let mut state = self.begin("create_file", timeout)?;
        let fs = state.filesystem_mut(filesystem)?;
        let key = Key::from_backend_name(path);
        if key.is_root() {
            return Err(root_not_allowed("create_file"));
        }
        match fs.entries.get(&key) {
            Some(e) if e.resource == ResourceType::Directory => {
                return Err(BackendError::service(
                    409,
                    "PathConflict",
                    format!("{key} is a directory"),
                ));
            }
            Some(_) if !overwrite => {
                return Err(BackendError::service(
                    409,
                    "PathAlreadyExists",
                    format!("The specified path already exists: {key}"),
                ));
            }
            _ => {}
        }
        fs.ensure_parents(&key)?;
        _ = fs.entries.insert(key, Entry::new(ResourceType::File));
        Ok(())
    }

    fn create_directory(
        &self,
        filesystem: &str,
        path: &str,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let mut state = self.begin("create_directory", timeout)?;
        let fs = state.filesystem_mut(filesystem)?;
        let key = Key::from_backend_name(path);
        if key.is_root() {
            return Ok(());
        }
        match fs.entries.get_mut(&key) {
            Some(e) if e.resource == ResourceType::File => Err(BackendError::service(
                409,
                "PathAlreadyExists",
                format!("A file already exists at {key}"),
            )),
            Some(e) => {
                e.modified = Utc::now();
                Ok(())
            }
            None => {
                fs.ensure_parents(&key)?;
                _ = fs.entries.insert(key, Entry::new(ResourceType::Directory));
                Ok(())
            }
        }
    }

    fn append(
        &self,
        filesystem: &str,
        path: &str,
        offset: u64,
        data: &[u8],
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let mut state = self.begin("append", timeout)?;
        let entry = state
            .filesystem_mut(filesystem)?
            .file_mut(&Key::from_backend_name(path))?;
        let committed = entry.data.len() as u64;
        let expected = committed + entry.staged.len() as u64;
        if offset == committed {
            // Appending at the committed length discards abandoned uncommitted data
            entry.staged.clear();
        } else if offset != expected {
            return Err(BackendError::service(
                400,
                "InvalidAppendPosition",
                format!("append at {offset}, expected {expected}"),
            ));
        }
        entry.staged.extend_from_slice(data);
        Ok(())
    }

    fn flush(
        &self,
        filesystem: &str,
        path: &str,
        position: u64,
        content: &ContentSettings,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let mut state = self.begin("flush", timeout)?;
        let entry = state
            .filesystem_mut(filesystem)?
            .file_mut(&Key::from_backend_name(path))?;
        let expected = (entry.data.len() + entry.staged.len()) as u64;
        if position != expected {
            return Err(BackendError::service(
                400,
                "InvalidFlushPosition",
                format!("flush at {position}, expected {expected}"),
            ));
        }
        let staged = std::mem::take(&mut entry.staged);
        entry.data.extend_from_slice(&staged);
        entry.modified = Utc::now();
        if !content.is_empty() {
            entry.content = content.clone();
        }
        Ok(())
    }

    fn read(
        &self,
        filesystem: &str,
        path: &str,
        offset: u64,
        len: u64,
        timeout: Option<Duration>,
    ) -> BackendResult<Bytes> {
        let mut state = self.begin("read", timeout)?;
        let entry = state
            .filesystem_mut(filesystem)?
            .file_mut(&Key::from_backend_name(path))?;
        let size = entry.data.len() as u64;
        let start = offset.min(size) as usize;
        let end = offset.saturating_add(len).min(size) as usize;
        Ok(Bytes::copy_from_slice(&entry.data[start..end]))
    }

    fn rename(
        &self,
        source_filesystem: &str,
        source: &str,
        dest_filesystem: &str,
        dest: &str,
        overwrite: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let mut state = self.begin("rename", timeout)?;
        let src = Key::from_backend_name(source);
        let dst = Key::from_backend_name(dest);
        if src.is_root() || dst.is_root() {
            return Err(root_not_allowed("rename"));
        }

        let src_resource = match state.filesystem(source_filesystem)?.entries.get(&src) {
            Some(e) => e.resource,
            None => {
                return Err(BackendError::service(
                    404,
                    "SourcePathNotFound",
                    format!("The source path does not exist: {src}"),
                ));
            }
        };
        let same_fs = source_filesystem == dest_filesystem;
        if same_fs && src == dst {
            return Ok(());
        }
        if same_fs && dst.starts_with(&src) {
            return Err(BackendError::service(
                400,
                "InvalidDestinationPath",
                format!("cannot move {src} beneath itself"),
            ));
        }

        let dest_fs = state.filesystem(dest_filesystem)?;
        if let Some(parent) = dst.parent().filter(|p| !p.is_root()) {
            match dest_fs.entries.get(&parent) {
                Some(e) if e.resource == ResourceType::Directory => {}
                _ => {
                    return Err(BackendError::service(
                        404,
                        "RenameDestinationParentPathNotFound",
                        format!("The parent of {dst} does not exist"),
                    ));
                }
            }
        }
        if let Some(existing) = dest_fs.entries.get(&dst) {
            if !overwrite {
                return Err(BackendError::service(
                    409,
                    "PathAlreadyExists",
                    format!("The specified path already exists: {dst}"),
                ));
            }
            if existing.resource != src_resource {
                return Err(BackendError::service(
                    409,
                    "PathConflict",
                    format!("{dst} is of a different resource type"),
                ));
            }
            if dest_fs.has_children(&dst) {
                return Err(BackendError::service(
                    409,
                    "DirectoryNotEmpty",
                    format!("The destination directory is not empty: {dst}"),
                ));
            }
        }

        let moved = state.filesystem_mut(source_filesystem)?.take_subtree(&src);
        let dest_fs = state.filesystem_mut(dest_filesystem)?;
        _ = dest_fs.entries.remove(&dst);
        let prefix = src.segments().len();
        for (key, entry) in moved {
            let mut renamed = dst.clone();
            for segment in &key.segments()[prefix..] {
                renamed = renamed.join(segment);
            }
            _ = dest_fs.entries.insert(renamed, entry);
        }
        Ok(())
    }

    fn delete(
        &self,
        filesystem: &str,
        path: &str,
        recursive: bool,
        timeout: Option<Duration>,
    ) -> BackendResult<()> {
        let mut state = self.begin("delete", timeout)?;
        let fs = state.filesystem_mut(filesystem)?;
        let key = Key::from_backend_name(path);
        if key.is_root() {
            return Err(root_not_allowed("delete"));
        }
        let resource = fs.entry(&key)?.resource;
        if resource == ResourceType::Directory && !recursive && fs.has_children(&key) {
            return Err(BackendError::service(
                409,
                "DirectoryNotEmpty",
                format!("The recursive query parameter value must be true to delete a non-empty directory: {key}"),
            ));
        }
        _ = fs.take_subtree(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new("acct");
        backend.create_filesystem("fs", None).unwrap();
        backend
    }

    fn names(page: &Page<PathProperties>) -> Vec<&str> {
        page.items.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn test_appends_invisible_until_flush() {
        let b = backend();
        b.create_file("fs", "a/f", false, None).unwrap();
        b.append("fs", "a/f", 0, b"hello", None).unwrap();
        assert_eq!(b.get_properties("fs", "a/f", None).unwrap().content_length, 0);
        assert_eq!(b.read("fs", "a/f", 0, 10, None).unwrap().len(), 0);
        assert_eq!(b.staged_len("fs", "a/f"), Some(5));

        b.flush("fs", "a/f", 5, &ContentSettings::default(), None)
            .unwrap();
        assert_eq!(b.get_properties("fs", "a/f", None).unwrap().content_length, 5);
        assert_eq!(&b.read("fs", "a/f", 1, 3, None).unwrap()[..], b"ell");
        assert!(b.get_properties("fs", "a", None).unwrap().is_directory());
    }

    #[test]
    fn test_append_position_is_checked() {
        let b = backend();
        b.create_file("fs", "f", false, None).unwrap();
        b.append("fs", "f", 0, b"abc", None).unwrap();
        let err = b.append("fs", "f", 5, b"abc", None).unwrap_err();
        assert_eq!(err.code(), Some("InvalidAppendPosition"));
        let err = b
            .flush("fs", "f", 2, &ContentSettings::default(), None)
            .unwrap_err();
        assert_eq!(err.code(), Some("InvalidFlushPosition"));

        // restarting at the committed length drops the abandoned bytes
        b.append("fs", "f", 0, b"xy", None).unwrap();
        assert_eq!(b.staged_len("fs", "f"), Some(2));
    }

    #[test]
    fn test_pagination_in_segment_order() {
        let b = backend().with_page_size(2);
        for p in ["a/x", "a.b", "a/y/z", "b"] {
            b.create_file("fs", p, false, None).unwrap();
        }
        let mut token: Option<String> = None;
        let mut all = Vec::new();
        loop {
            let request = ListRequest {
                filesystem: "fs",
                directory: "",
                recursive: true,
                continuation: token.as_deref(),
                max_results: None,
            };
            let page = b.list_paths(&request, None).unwrap();
            assert!(page.items.len() <= 2);
            all.extend(names(&page).into_iter().map(str::to_string));
            match page.continuation {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        assert_eq!(all, ["a", "a/x", "a/y", "a/y/z", "a.b", "b"]);
    }

    #[test]
    fn test_non_recursive_listing() {
        let b = backend();
        b.create_file("fs", "d/one", false, None).unwrap();
        b.create_file("fs", "d/sub/two", false, None).unwrap();
        let request = ListRequest {
            filesystem: "fs",
            directory: "d",
            recursive: false,
            continuation: None,
            max_results: None,
        };
        let page = b.list_paths(&request, None).unwrap();
        assert_eq!(names(&page), ["d/one", "d/sub"]);
    }

    #[test]
    fn test_rename_and_delete() {
        let b = backend();
        b.create_file("fs", "d/sub/f", false, None).unwrap();
        b.create_directory("fs", "e", None).unwrap();
        b.rename("fs", "d", "fs", "e/d2", false, None).unwrap();
        assert!(b.get_properties("fs", "e/d2/sub/f", None).is_ok());
        assert_eq!(
            b.get_properties("fs", "d", None).unwrap_err().code(),
            Some("PathNotFound")
        );

        let err = b.delete("fs", "e", false, None).unwrap_err();
        assert_eq!(err.code(), Some("DirectoryNotEmpty"));
        b.delete("fs", "e", true, None).unwrap();
        assert!(b.get_properties("fs", "e/d2", None).is_err());
    }

    #[test]
    fn test_latency_and_failures() {
        let b = backend();
        b.set_latency(Some(Duration::from_secs(2)));
        let err = b
            .get_properties("fs", "", Some(Duration::from_secs(1)))
            .unwrap_err();
        assert!(err.timed_out);
        assert!(b.get_properties("fs", "", Some(Duration::from_secs(3))).is_ok());
        assert!(b.get_properties("fs", "", None).is_ok());

        b.inject_failure("delete", BackendError::service(500, "InternalError", "boom"));
        b.create_file("fs", "f", false, None).unwrap();
        assert!(b.delete("fs", "f", false, None).is_err());
        assert!(b.delete("fs", "f", false, None).is_ok());
        assert_eq!(b.last_timeout("delete"), Some(None));
    }
}
