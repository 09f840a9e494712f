//! Stat and selector listings.
//!
//! A [`Listing`] is a lazy, finite iterator over one selector. Pages are
//! fetched only when the entries already fetched are exhausted, and
//! continuation tokens are followed transparently. Each page is sorted by
//! key segments before it is emitted, and entries at or below the last one
//! queued from the same listing are dropped, which discards repeats a
//! backend sends across page boundaries. After an error the iterator is
//! fused; re-issue the selector to start over.

use crate::backend::{ListRequest, PathProperties};
use crate::error::{Error, ErrorKind, Result};
use crate::handler::{Context, FileInfo, FileSelector};
use crate::mapper::CallContext;
use crate::path::Key;
use crate::timeouts::OperationKind;
use crate::writer::is_staging_name;
use diagnostics::emit::debug;
use std::collections::VecDeque;

pub(crate) fn get_file_info(ctx: &Context, raw: &str) -> Result<FileInfo> {
    let path = ctx.resolve(raw)?;
    let shown = ctx.display(path.scope.as_deref(), &path.key);
    let Some(scope) = path.scope.as_deref() else {
        return Ok(FileInfo::directory(shown, None));
    };

    if path.key.is_root() {
        let found = ctx.call(
            OperationKind::Metadata,
            CallContext::Lookup,
            "get_filesystem_properties",
            &shown,
            |b, t| b.get_filesystem_properties(scope, t),
        );
        return match found {
            Ok(item) => Ok(FileInfo::directory(shown, item.last_modified)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FileInfo::not_found(shown)),
            Err(e) => Err(e),
        };
    }

    Ok(match ctx.lookup(scope, &path.key, &shown)? {
        Some(props) => FileInfo::from_properties(shown, &props),
        None => FileInfo::not_found(shown),
    })
}

/// Pending work. Page steps carry the last name already queued from the
/// same stream; pages arrive in name order, so anything at or below it is a
/// repeat from an overlapping page.
enum Step {
    Emit(FileInfo),
    Filesystems {
        continuation: Option<String>,
        after: Option<String>,
    },
    Paths {
        scope: String,
        directory: Key,
        continuation: Option<String>,
        after: Option<Key>,
    },
}

/// Entries of one selector, in path order
pub struct Listing {
    ctx: Context,
    recursive: bool,
    steps: VecDeque<Step>,
    fused: bool,
}

impl Listing {
    /// Checks the base eagerly so a missing or non-directory base fails at
    /// the call rather than on the first `next()`.
    pub(crate) fn new(ctx: &Context, selector: &FileSelector) -> Result<Self> {
        let path = ctx.resolve(&selector.base_dir)?;
        let shown = ctx.display(path.scope.as_deref(), &path.key);
        let mut listing = Listing {
            ctx: ctx.clone(),
            recursive: selector.recursive,
            steps: VecDeque::new(),
            fused: false,
        };

        let Some(scope) = path.scope else {
            listing
                .steps
                .push_back(Step::Filesystems {
                    continuation: None,
                    after: None,
                });
            return Ok(listing);
        };

        let exists = if path.key.is_root() {
            ctx.scope_exists(&scope, &shown)?
        } else {
            match ctx.lookup(&scope, &path.key, &shown)? {
                Some(props) if props.is_directory() => true,
                Some(_) => return Err(Error::not_a_directory(shown)),
                None => false,
            }
        };

        if !exists {
            if selector.allow_not_found {
                return Ok(listing);
            }
            return Err(Error::not_found(shown));
        }

        listing.steps.push_back(Step::Paths {
            scope,
            directory: path.key,
            continuation: None,
            after: None,
        });
        Ok(listing)
    }

    fn fetch_filesystems(
        &mut self,
        continuation: Option<String>,
        mut after: Option<String>,
    ) -> Result<()> {
        let shown = self.ctx.display(None, &Key::root());
        let page = self.ctx.call(
            OperationKind::List,
            CallContext::Lookup,
            "list_filesystems",
            &shown,
            |b, t| b.list_filesystems(continuation.as_deref(), t),
        )?;
        let count = page.items.len();
        debug!("Fetched page of {count} filesystems");

        let mut items = page.items;
        items.sort_by(|a, b| a.name.cmp(&b.name));

        let mut next = Vec::new();
        for item in items {
            if after.as_ref().is_some_and(|last| item.name <= *last) {
                continue;
            }
            after = Some(item.name.clone());
            let path = self.ctx.display(Some(&item.name), &Key::root());
            next.push(Step::Emit(FileInfo::directory(path, item.last_modified)));
            if self.recursive {
                next.push(Step::Paths {
                    scope: item.name,
                    directory: Key::root(),
                    continuation: None,
                    after: None,
                });
            }
        }
        if let Some(token) = page.continuation {
            next.push(Step::Filesystems {
                continuation: Some(token),
                after,
            });
        }
        self.push_front(next);
        Ok(())
    }

    fn fetch_paths(
        &mut self,
        scope: String,
        directory: Key,
        continuation: Option<String>,
        mut after: Option<Key>,
    ) -> Result<()> {
        let shown = self.ctx.display(Some(&scope), &directory);
        let name = directory.as_backend_name();
        let request = ListRequest {
            filesystem: &scope,
            directory: &name,
            recursive: self.recursive,
            continuation: continuation.as_deref(),
            max_results: self.ctx.options.page_size,
        };
        let page = self.ctx.call(
            OperationKind::List,
            CallContext::Lookup,
            "list_paths",
            &shown,
            |b, t| b.list_paths(&request, t),
        )?;
        let count = page.items.len();
        let more = page.continuation.is_some();
        debug!("Fetched page of {count} entries under {shown} (more: {more})");

        let mut entries: Vec<(Key, PathProperties)> = page
            .items
            .into_iter()
            .map(|props| (Key::from_backend_name(&props.name), props))
            .filter(|(key, _)| !key.segments().iter().any(|s| is_staging_name(s)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut next = Vec::new();
        for (key, props) in entries {
            if after.as_ref().is_some_and(|last| key <= *last) {
                continue;
            }
            let path = self.ctx.display(Some(&scope), &key);
            next.push(Step::Emit(FileInfo::from_properties(path, &props)));
            after = Some(key);
        }
        if let Some(token) = page.continuation {
            next.push(Step::Paths {
                scope,
                directory,
                continuation: Some(token),
                after,
            });
        }
        self.push_front(next);
        Ok(())
    }

    /// Queues `steps` ahead of the remaining work, keeping their order.
    fn push_front(&mut self, steps: Vec<Step>) {
        for step in steps.into_iter().rev() {
            self.steps.push_front(step);
        }
    }
}

impl Iterator for Listing {
    type Item = Result<FileInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.fused {
                return None;
            }
            let fetched = match self.steps.pop_front()? {
                Step::Emit(info) => return Some(Ok(info)),
                Step::Filesystems {
                    continuation,
                    after,
                } => self.fetch_filesystems(continuation, after),
                Step::Paths {
                    scope,
                    directory,
                    continuation,
                    after,
                } => self.fetch_paths(scope, directory, continuation, after),
            };
            if let Err(e) = fetched {
                self.fused = true;
                self.steps.clear();
                return Some(Err(e));
            }
        }
    }
}

impl std::iter::FusedIterator for Listing {}
