//! Buffered writers with commit-on-close.
//!
//! An output stream never touches its target until `close()`. Bytes go to a
//! hidden staging file next to the target, appended in `block_size` chunks
//! at the exact offset written so far. Close appends the remainder, flushes
//! (which commits the length and the content settings) and renames the
//! staging file over the target, so a concurrent reader sees either the
//! previous complete object or the new one.
//!
//! Creating the staging file creates missing parent directories, as any
//! create does. When the stream is discarded instead of committed, the
//! directories it created are removed again as long as they are empty.
//!
//! Append streams write to the target itself. Appended blocks stay
//! uncommitted, and therefore invisible, until the flush issued by close.

use crate::content::ContentSettings;
use crate::error::{Error, Result};
use crate::handler::Context;
use crate::mapper::CallContext;
use crate::path::Key;
use crate::timeouts::OperationKind;
use diagnostics::emit::{debug, info, warn};
use std::io;

/// Name prefix of in-progress uploads; listings skip such entries.
pub const STAGING_PREFIX: &str = ".adlsfs-staging-";

#[must_use]
pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX)
}

fn staging_key(target: &Key) -> Key {
    let name = target.name().unwrap_or_default();
    let staged = format!("{STAGING_PREFIX}{}-{name}", uuid7::uuid7());
    target.parent().unwrap_or_default().join(&staged)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Replace,
    Append,
}

pub struct OutputStream {
    ctx: Context,
    scope: String,
    target: Key,
    /// Key receiving appends: the staging file, or the target when appending
    upload: Key,
    shown: String,
    mode: Mode,
    content: ContentSettings,
    buffer: Vec<u8>,
    /// Bytes already appended to `upload`, including its committed length
    appended: u64,
    closed: bool,
    /// A backend call failed; nothing from this stream will be committed
    failed: bool,
    /// Parents that did not exist before the staging file, deepest first
    created_parents: Vec<Key>,
}

impl OutputStream {
    pub(crate) fn create(ctx: &Context, raw: &str, metadata: &[(&str, &str)]) -> Result<Self> {
        Self::open(ctx, raw, metadata, Mode::Replace)
    }

    pub(crate) fn append(ctx: &Context, raw: &str, metadata: &[(&str, &str)]) -> Result<Self> {
        Self::open(ctx, raw, metadata, Mode::Append)
    }

    fn open(ctx: &Context, raw: &str, metadata: &[(&str, &str)], mode: Mode) -> Result<Self> {
        let content = ContentSettings::from_options(metadata.iter().copied())?;
        let path = ctx.resolve(raw)?;
        let shown = ctx.display(path.scope.as_deref(), &path.key);
        let (scope, target) = ctx.resolver.object(raw, &path)?;
        let (scope, target) = (scope.to_string(), target.clone());

        let existing = ctx.lookup(&scope, &target, &shown)?;
        if existing.as_ref().is_some_and(|p| p.is_directory()) {
            return Err(Error::is_a_directory(shown));
        }

        let mut created_parents = Vec::new();
        let (upload, appended) = match (mode, existing) {
            (Mode::Append, Some(props)) => (target.clone(), props.content_length),
            (Mode::Append, None) => {
                create_file(ctx, &scope, &target, &shown)?;
                (target.clone(), 0)
            }
            (Mode::Replace, existing) => {
                if existing.is_none() {
                    created_parents = missing_parents(ctx, &scope, &target)?;
                }
                let staging = staging_key(&target);
                create_file(ctx, &scope, &staging, &shown)?;
                (staging, 0)
            }
        };

        debug!("Opened output stream for {shown} at offset {appended}");
        Ok(OutputStream {
            ctx: ctx.clone(),
            scope,
            target,
            upload,
            shown,
            mode,
            content,
            buffer: Vec::new(),
            appended,
            closed: false,
            failed: false,
            created_parents,
        })
    }

    /// Buffers `data`, appending full blocks to the backend as they fill.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.check_open()?;
        self.buffer.extend_from_slice(data);
        let block_size = self.ctx.options.block_size.max(1);
        while self.buffer.len() >= block_size {
            let rest = self.buffer.split_off(block_size);
            let block = std::mem::replace(&mut self.buffer, rest);
            if let Err(e) = self.append_block(&block) {
                self.fail();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Logical position: committed length plus everything written since open
    pub fn tell(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.appended + self.buffer.len() as u64)
    }

    /// Caller-visible path of the target
    #[must_use]
    pub fn path(&self) -> &str {
        &self.shown
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Commits everything written. Closing again is a no-op.
    ///
    /// Once any append or the commit itself has failed the stream is
    /// closed for good, the target keeps its previous content, and every
    /// later `close` reports `InvalidState`.
    pub fn close(&mut self) -> Result<()> {
        if self.failed {
            return Err(self.failed_error());
        }
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let committed = self.commit();
        if committed.is_err() {
            self.failed = true;
            self.discard_staging();
        }
        committed
    }

    /// Closes without committing.
    pub fn abort(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.buffer.clear();
        self.discard_staging();
    }

    /// Gives up on the upload after a failed append. The bytes of the
    /// failed block are lost, so committing what remains would leave a gap.
    fn fail(&mut self) {
        self.closed = true;
        self.failed = true;
        self.buffer.clear();
        let shown = &self.shown;
        warn!("Append to {shown} failed, discarding the upload");
        self.discard_staging();
    }

    fn failed_error(&self) -> Error {
        Error::invalid_state(&self.shown, "an earlier write failed, nothing was committed")
    }

    fn commit(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            let block = std::mem::take(&mut self.buffer);
            self.append_block(&block)?;
        }

        let upload = self.upload.as_backend_name();
        let position = self.appended;
        let content = &self.content;
        let scope = &self.scope;
        self.ctx.call(
            OperationKind::Write,
            CallContext::Modify,
            "flush",
            &self.shown,
            |b, t| b.flush(scope, &upload, position, content, t),
        )?;

        if self.mode == Mode::Replace {
            let target = self.target.as_backend_name();
            self.ctx.call(
                OperationKind::Mutate,
                CallContext::Modify,
                "rename",
                &self.shown,
                |b, t| b.rename(scope, &upload, scope, &target, true, t),
            )?;
        }

        let shown = &self.shown;
        info!("Committed {position} bytes to {shown}");
        Ok(())
    }

    fn append_block(&mut self, block: &[u8]) -> Result<()> {
        if block.is_empty() {
            return Ok(());
        }
        let upload = self.upload.as_backend_name();
        let offset = self.appended;
        let scope = &self.scope;
        self.ctx.call(
            OperationKind::Write,
            CallContext::Modify,
            "append",
            &self.shown,
            |b, t| b.append(scope, &upload, offset, block, t),
        )?;
        self.appended += block.len() as u64;
        let bytes = block.len();
        debug!("Appended {bytes} bytes at offset {offset}");
        Ok(())
    }

    /// Best-effort removal of the staging file
    fn discard_staging(&self) {
        if self.mode != Mode::Replace {
            return;
        }
        let upload = self.upload.as_backend_name();
        let scope = &self.scope;
        let removed = self.ctx.call(
            OperationKind::Mutate,
            CallContext::Modify,
            "delete",
            &self.shown,
            |b, t| b.delete(scope, &upload, false, t),
        );
        if let Err(e) = removed {
            let error = e.to_string();
            warn!("Could not remove staging file {upload}: {error}");
            return;
        }
        for dir in &self.created_parents {
            let name = dir.as_backend_name();
            let removed = self.ctx.call(
                OperationKind::Mutate,
                CallContext::Modify,
                "delete",
                &self.shown,
                |b, t| b.delete(scope, &name, false, t),
            );
            // Someone else wrote there meanwhile
            if removed.is_err() {
                break;
            }
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.failed {
            return Err(self.failed_error());
        }
        if self.closed {
            return Err(Error::invalid_state(&self.shown, "output stream is closed"));
        }
        Ok(())
    }
}

/// Ancestors of `target` that do not exist yet, deepest first
fn missing_parents(ctx: &Context, scope: &str, target: &Key) -> Result<Vec<Key>> {
    let mut missing = Vec::new();
    let mut dir = target.parent().unwrap_or_default();
    while !dir.is_root() {
        let shown = ctx.display(Some(scope), &dir);
        match ctx.lookup(scope, &dir, &shown)? {
            Some(props) if props.is_directory() => break,
            Some(_) => return Err(Error::not_a_directory(shown)),
            None => {
                let parent = dir.parent().unwrap_or_default();
                missing.push(dir);
                dir = parent;
            }
        }
    }
    Ok(missing)
}

fn create_file(ctx: &Context, scope: &str, key: &Key, shown: &str) -> Result<()> {
    let name = key.as_backend_name();
    ctx.call(
        OperationKind::Mutate,
        CallContext::Create,
        "create_file",
        shown,
        |b, t| b.create_file(scope, &name, false, t),
    )
}

impl io::Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        OutputStream::write(self, buf)?;
        Ok(buf.len())
    }

    /// Commit happens on close only
    fn flush(&mut self) -> io::Result<()> {
        self.check_open()?;
        Ok(())
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let shown = &self.shown;
        warn!("Output stream for {shown} dropped without close, discarding uncommitted data");
        self.abort();
    }
}
