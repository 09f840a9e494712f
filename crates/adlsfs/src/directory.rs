//! Directory mutation, deletes, moves and copies.
//!
//! Preconditions the service would report ambiguously (a file where a
//! directory is expected, a missing parent) are checked with a lookup
//! first so the caller gets a precise error kind.

use crate::backend::ListRequest;
use crate::error::{Error, ErrorKind, Result};
use crate::handler::Context;
use crate::mapper::CallContext;
use crate::path::Key;
use crate::reader::InputStream;
use crate::timeouts::OperationKind;
use crate::writer::{OutputStream, is_staging_name};
use diagnostics::emit::{debug, info};

pub(crate) fn create_dir(ctx: &Context, raw: &str, recursive: bool) -> Result<()> {
    let path = ctx.resolve(raw)?;
    let shown = ctx.display(path.scope.as_deref(), &path.key);
    let Some(scope) = path.scope.as_deref() else {
        // The account root always exists
        return Ok(());
    };

    if path.key.is_root() {
        return create_scope(ctx, scope, &shown);
    }

    if !recursive {
        let parent = path.key.parent().unwrap_or_default();
        let parent_shown = ctx.display(Some(scope), &parent);
        if parent.is_root() {
            if !ctx.scope_exists(scope, &parent_shown)? {
                return Err(Error::not_found(parent_shown));
            }
        } else {
            match ctx.lookup(scope, &parent, &parent_shown)? {
                None => return Err(Error::not_found(parent_shown)),
                Some(props) if !props.is_directory() => {
                    return Err(Error::not_a_directory(parent_shown));
                }
                Some(_) => {}
            }
        }
    }

    let name = path.key.as_backend_name();
    let create = || {
        ctx.call(
            OperationKind::Mutate,
            CallContext::Create,
            "create_directory",
            &shown,
            |b, t| b.create_directory(scope, &name, t),
        )
    };
    let created = match create() {
        // A recursive create also creates a missing filesystem
        Err(e) if recursive && e.kind() == ErrorKind::NotFound => {
            create_scope(ctx, scope, &ctx.display(Some(scope), &Key::root()))?;
            create()
        }
        other => other,
    };
    match created {
        Ok(()) => {
            info!("Created directory {shown}");
            Ok(())
        }
        // A file occupies the path or one of its ancestors
        Err(e) if matches!(e.kind(), ErrorKind::Conflict | ErrorKind::AlreadyExists) => {
            Err(Error::not_a_directory(shown))
        }
        Err(e) => Err(e),
    }
}

/// Creates a filesystem; an existing one is kept.
fn create_scope(ctx: &Context, scope: &str, shown: &str) -> Result<()> {
    let created = ctx.call(
        OperationKind::Mutate,
        CallContext::Create,
        "create_filesystem",
        shown,
        |b, t| b.create_filesystem(scope, t),
    );
    match created {
        Ok(()) => {
            info!("Created filesystem {scope}");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

pub(crate) fn delete_dir(ctx: &Context, raw: &str, recursive: bool) -> Result<()> {
    let path = ctx.resolve(raw)?;
    let shown = ctx.display(path.scope.as_deref(), &path.key);
    let Some(scope) = path.scope.as_deref() else {
        return Err(Error::invalid_argument(shown, "cannot delete the account root"));
    };

    if path.key.is_root() {
        if ctx.resolver.bound_filesystem().is_some() {
            return Err(Error::invalid_argument(
                shown,
                "cannot delete the root of a bound filesystem",
            ));
        }
        if !ctx.scope_exists(scope, &shown)? {
            return Err(Error::not_found(shown));
        }
        if !recursive && !child_names(ctx, scope, &path.key, &shown, Some(1))?.is_empty() {
            return Err(not_empty(ctx, scope, &path.key, &shown)?);
        }
        ctx.call(
            OperationKind::Mutate,
            CallContext::Modify,
            "delete_filesystem",
            &shown,
            |b, t| b.delete_filesystem(scope, t),
        )?;
        info!("Deleted filesystem {scope}");
        return Ok(());
    }

    match ctx.lookup(scope, &path.key, &shown)? {
        None => return Err(Error::not_found(shown)),
        Some(props) if !props.is_directory() => return Err(Error::not_a_directory(shown)),
        Some(_) => {}
    }
    let name = path.key.as_backend_name();
    let deleted = ctx.call(
        OperationKind::Mutate,
        CallContext::Modify,
        "delete",
        &shown,
        |b, t| b.delete(scope, &name, recursive, t),
    );
    match deleted {
        Err(e) if !recursive && e.kind() == ErrorKind::Conflict => {
            return Err(not_empty(ctx, scope, &path.key, &shown)?);
        }
        other => other?,
    }
    info!("Deleted directory {shown} (recursive: {recursive})");
    Ok(())
}

pub(crate) fn delete_dir_contents(ctx: &Context, raw: &str, accept_root: bool) -> Result<()> {
    let path = ctx.resolve(raw)?;
    let shown = ctx.display(path.scope.as_deref(), &path.key);
    let Some(scope) = path.scope.as_deref() else {
        return Err(Error::invalid_argument(
            shown,
            "refusing to delete every filesystem in the account",
        ));
    };

    if path.key.is_root() {
        if !accept_root {
            return Err(Error::invalid_argument(
                shown,
                "refusing to delete the contents of a filesystem root",
            ));
        }
        if !ctx.scope_exists(scope, &shown)? {
            return Err(Error::not_found(shown));
        }
    } else {
        match ctx.lookup(scope, &path.key, &shown)? {
            None => return Err(Error::not_found(shown)),
            Some(props) if !props.is_directory() => return Err(Error::not_a_directory(shown)),
            Some(_) => {}
        }
    }

    // Collected up front so deletes cannot disturb the pagination. Uploads
    // in progress are left to their writers.
    let mut children = child_names(ctx, scope, &path.key, &shown, None)?;
    children.retain(|child| !is_staging(child));
    let count = children.len();
    for child in children {
        let child_shown = ctx.display(Some(scope), &Key::from_backend_name(&child));
        ctx.call(
            OperationKind::Mutate,
            CallContext::Modify,
            "delete",
            &child_shown,
            |b, t| b.delete(scope, &child, true, t),
        )?;
    }
    info!("Deleted {count} entries under {shown}");
    Ok(())
}

fn is_staging(name: &str) -> bool {
    Key::from_backend_name(name).name().is_some_and(is_staging_name)
}

/// Conflict for a non-recursive delete of a directory that still has
/// children. Staging files of unfinished uploads are not listed, so a
/// directory holding only those gets its own reason.
fn not_empty(ctx: &Context, scope: &str, dir: &Key, shown: &str) -> Result<Error> {
    let children = child_names(ctx, scope, dir, shown, None)?;
    if !children.is_empty() && children.iter().all(|c| is_staging(c)) {
        return Ok(Error::conflict(shown, "directory holds uploads still in progress"));
    }
    Ok(Error::conflict(shown, "directory is not empty"))
}

/// Backend names of the immediate children of `dir`, at most `limit`
fn child_names(
    ctx: &Context,
    scope: &str,
    dir: &Key,
    shown: &str,
    limit: Option<usize>,
) -> Result<Vec<String>> {
    let directory = dir.as_backend_name();
    let mut names = Vec::new();
    let mut continuation: Option<String> = None;
    loop {
        let request = ListRequest {
            filesystem: scope,
            directory: &directory,
            recursive: false,
            continuation: continuation.as_deref(),
            max_results: limit.or(ctx.options.page_size),
        };
        let page = ctx.call(
            OperationKind::List,
            CallContext::Lookup,
            "list_paths",
            shown,
            |b, t| b.list_paths(&request, t),
        )?;
        names.extend(page.items.into_iter().map(|p| p.name));
        if limit.is_some_and(|l| names.len() >= l) {
            names.truncate(limit.unwrap_or_default());
            return Ok(names);
        }
        match page.continuation {
            Some(token) => continuation = Some(token),
            None => return Ok(names),
        }
    }
}

pub(crate) fn delete_file(ctx: &Context, raw: &str) -> Result<()> {
    let path = ctx.resolve(raw)?;
    let shown = ctx.display(path.scope.as_deref(), &path.key);
    let (scope, key) = ctx.resolver.object(raw, &path)?;
    match ctx.lookup(scope, key, &shown)? {
        None => return Err(Error::not_found(shown)),
        Some(props) if props.is_directory() => return Err(Error::is_a_directory(shown)),
        Some(_) => {}
    }
    let name = key.as_backend_name();
    ctx.call(
        OperationKind::Mutate,
        CallContext::Modify,
        "delete",
        &shown,
        |b, t| b.delete(scope, &name, false, t),
    )?;
    debug!("Deleted file {shown}");
    Ok(())
}

/// Renames within the account. An existing destination is replaced only
/// when it is an empty directory replaced by a directory, or a file
/// replaced by a file with `overwrite` set.
pub(crate) fn move_path(ctx: &Context, src: &str, dst: &str, overwrite: bool) -> Result<()> {
    let source = ctx.resolve(src)?;
    let dest = ctx.resolve(dst)?;
    let src_shown = ctx.display(source.scope.as_deref(), &source.key);
    let dst_shown = ctx.display(dest.scope.as_deref(), &dest.key);

    let (src_scope, dst_scope) = match (source.scope.as_deref(), dest.scope.as_deref()) {
        (Some(s), Some(d)) if !source.key.is_root() && !dest.key.is_root() => (s, d),
        _ => {
            return Err(Error::invalid_argument(
                format!("{src_shown} -> {dst_shown}"),
                "filesystems cannot be moved or replaced",
            ));
        }
    };

    let Some(src_props) = ctx.lookup(src_scope, &source.key, &src_shown)? else {
        return Err(Error::not_found(src_shown));
    };
    if src_scope == dst_scope && source.key == dest.key {
        return Ok(());
    }
    if src_scope == dst_scope && dest.key.starts_with(&source.key) {
        return Err(Error::invalid_argument(
            dst_shown,
            format!("cannot move {src_shown} beneath itself"),
        ));
    }

    let parent = dest.key.parent().unwrap_or_default();
    if !parent.is_root() {
        let parent_shown = ctx.display(Some(dst_scope), &parent);
        match ctx.lookup(dst_scope, &parent, &parent_shown)? {
            Some(props) if props.is_directory() => {}
            Some(_) => return Err(Error::not_a_directory(parent_shown)),
            None => return Err(Error::not_found(parent_shown)),
        }
    }

    let replace = match ctx.lookup(dst_scope, &dest.key, &dst_shown)? {
        None => false,
        Some(existing) => match (src_props.is_directory(), existing.is_directory()) {
            (true, true) => {
                if !child_names(ctx, dst_scope, &dest.key, &dst_shown, Some(1))?.is_empty() {
                    return Err(Error::conflict(dst_shown, "destination directory is not empty"));
                }
                true
            }
            (false, false) if overwrite => true,
            (false, false) => return Err(Error::already_exists(dst_shown)),
            (true, false) => {
                return Err(Error::conflict(dst_shown, "cannot replace a file with a directory"));
            }
            (false, true) => {
                return Err(Error::conflict(dst_shown, "cannot replace a directory with a file"));
            }
        },
    };

    let src_name = source.key.as_backend_name();
    let dst_name = dest.key.as_backend_name();
    ctx.call(
        OperationKind::Mutate,
        CallContext::Modify,
        "rename",
        &src_shown,
        |b, t| b.rename(src_scope, &src_name, dst_scope, &dst_name, replace, t),
    )?;
    info!("Moved {src_shown} to {dst_shown}");
    Ok(())
}

/// Streams `src` into a new object at `dst`; the service has no copy call.
pub(crate) fn copy_file(ctx: &Context, src: &str, dst: &str) -> Result<()> {
    let mut input = InputStream::open_file(ctx, src)?;
    let mut output = OutputStream::create(ctx, dst, &[])?;
    let chunk = ctx.options.block_size.max(1);
    loop {
        let data = input.read(chunk)?;
        if data.is_empty() {
            break;
        }
        output.write(&data)?;
    }
    output.close()?;
    input.close();
    let (src_shown, dst_shown) = (input.path(), output.path());
    info!("Copied {src_shown} to {dst_shown}");
    Ok(())
}
