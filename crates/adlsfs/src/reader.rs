//! Lazy, seekable ranged reads.
//!
//! Opening an input stream costs nothing; the first read (or a size query)
//! looks the object up. Reads are served from a read-ahead buffer that is
//! refilled with one ranged request when exhausted and discarded on every
//! seek. Each ranged request observes the object as of when it is issued.

use crate::error::{Error, Result};
use crate::handler::Context;
use crate::mapper::CallContext;
use crate::path::Key;
use crate::timeouts::OperationKind;
use bytes::{Bytes, BytesMut};
use diagnostics::emit::debug;
use std::io::{self, SeekFrom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Not yet looked up
    Open,
    Active,
    Closed,
}

pub struct InputStream {
    ctx: Context,
    scope: String,
    key: Key,
    shown: String,
    state: State,
    position: u64,
    size: Option<u64>,
    buffer: Bytes,
    buffer_start: u64,
    /// Offset where the backend reported the end of the object
    end: Option<u64>,
}

impl InputStream {
    pub(crate) fn open(ctx: &Context, raw: &str) -> Result<Self> {
        let path = ctx.resolve(raw)?;
        let shown = ctx.display(path.scope.as_deref(), &path.key);
        let (scope, key) = ctx.resolver.object(raw, &path)?;
        Ok(InputStream {
            ctx: ctx.clone(),
            scope: scope.to_string(),
            key: key.clone(),
            shown,
            state: State::Open,
            position: 0,
            size: None,
            buffer: Bytes::new(),
            buffer_start: 0,
            end: None,
        })
    }

    /// Opens and looks the object up immediately.
    pub(crate) fn open_file(ctx: &Context, raw: &str) -> Result<Self> {
        let mut stream = Self::open(ctx, raw)?;
        stream.activate()?;
        Ok(stream)
    }

    fn activate(&mut self) -> Result<()> {
        if self.state != State::Open {
            return Ok(());
        }
        match self.ctx.lookup(&self.scope, &self.key, &self.shown)? {
            None => Err(Error::not_found(&self.shown)),
            Some(props) if props.is_directory() => Err(Error::is_a_directory(&self.shown)),
            Some(props) => {
                self.size = Some(props.content_length);
                self.state = State::Active;
                Ok(())
            }
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.state == State::Closed {
            return Err(Error::invalid_state(&self.shown, "input stream is closed"));
        }
        Ok(())
    }

    /// Reads up to `n` bytes from the cursor. Fewer than `n` bytes are
    /// returned only at the end of the object.
    pub fn read(&mut self, n: usize) -> Result<Bytes> {
        self.check_open()?;
        self.activate()?;
        if n == 0 {
            return Ok(Bytes::new());
        }

        let mut out = BytesMut::new();
        while out.len() < n {
            let wanted = n - out.len();
            let chunk = self.take_buffered(wanted);
            if !chunk.is_empty() {
                if out.is_empty() && chunk.len() == n {
                    return Ok(chunk);
                }
                out.extend_from_slice(&chunk);
                continue;
            }
            if self.end.is_some_and(|end| self.position >= end) {
                break;
            }
            self.fill(wanted)?;
        }
        Ok(out.freeze())
    }

    /// Bytes at the cursor that are already buffered, advancing the cursor
    fn take_buffered(&mut self, limit: usize) -> Bytes {
        let buffer_end = self.buffer_start + self.buffer.len() as u64;
        if self.position < self.buffer_start || self.position >= buffer_end {
            return Bytes::new();
        }
        let from = (self.position - self.buffer_start) as usize;
        let to = from + limit.min(self.buffer.len() - from);
        self.position += (to - from) as u64;
        self.buffer.slice(from..to)
    }

    fn fill(&mut self, wanted: usize) -> Result<()> {
        let len = wanted.max(self.ctx.options.read_ahead) as u64;
        let offset = self.position;
        let name = self.key.as_backend_name();
        let scope = &self.scope;
        let data = self.ctx.call(
            OperationKind::Read,
            CallContext::Lookup,
            "read",
            &self.shown,
            |b, t| b.read(scope, &name, offset, len, t),
        )?;
        let got = data.len();
        debug!("Read {got} bytes at offset {offset}");
        if (data.len() as u64) < len {
            self.end = Some(offset + data.len() as u64);
        }
        self.buffer = data;
        self.buffer_start = offset;
        Ok(())
    }

    /// Moves the cursor without any network call; the read-ahead buffer is dropped.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.check_open()?;
        self.position = position;
        self.buffer = Bytes::new();
        self.end = None;
        Ok(())
    }

    pub fn tell(&self) -> Result<u64> {
        self.check_open()?;
        Ok(self.position)
    }

    /// Object size as of the lookup
    pub fn size(&mut self) -> Result<u64> {
        self.check_open()?;
        self.activate()?;
        Ok(self.size.unwrap_or_default())
    }

    /// Everything from the cursor to the end of the object
    pub fn read_all(&mut self) -> Result<Bytes> {
        let remaining = self.size()?.saturating_sub(self.position) as usize;
        let mut out = BytesMut::with_capacity(remaining);
        loop {
            let chunk = self.read(self.ctx.options.read_ahead.max(remaining).max(1))?;
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }

    /// Caller-visible path of the object
    #[must_use]
    pub fn path(&self) -> &str {
        &self.shown
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Idempotent.
    pub fn close(&mut self) {
        self.state = State::Closed;
        self.buffer = Bytes::new();
    }
}

impl io::Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = InputStream::read(self, buf.len())?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl io::Seek for InputStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.tell()?.checked_add_signed(delta),
            SeekFrom::End(delta) => self.size()?.checked_add_signed(delta),
        };
        let Some(target) = target else {
            return Err(Error::invalid_argument(&self.shown, "seek before start of object").into());
        };
        InputStream::seek(self, target)?;
        Ok(target)
    }
}
