//! Handler pinned to one filesystem of a storage account.
//!
//! Paths are relative to the filesystem root. Fully qualified URLs are
//! accepted when they name this filesystem and account.

use crate::backend::DataLakeBackend;
use crate::config::AdapterConfig;
use crate::directory;
use crate::error::{Error, Result};
use crate::handler::{Context, FileInfo, FileSelector, FileSystem, HandlerOptions};
use crate::metadata::{self, Listing};
use crate::path::PathResolver;
use crate::reader::InputStream;
use crate::rest::{Credential, RestBackend};
use crate::timeouts::SharedTimeouts;
use crate::writer::OutputStream;
use std::sync::Arc;

#[derive(Clone)]
pub struct FilesystemHandler {
    ctx: Context,
}

impl FilesystemHandler {
    pub fn new<S: Into<String>>(backend: Arc<dyn DataLakeBackend>, filesystem: S) -> Self {
        Self::with_options(
            backend,
            filesystem,
            SharedTimeouts::default(),
            HandlerOptions::default(),
        )
    }

    pub fn with_options<S: Into<String>>(
        backend: Arc<dyn DataLakeBackend>,
        filesystem: S,
        timeouts: SharedTimeouts,
        options: HandlerOptions,
    ) -> Self {
        let resolver = PathResolver::filesystem(backend.account_name(), filesystem);
        Self {
            ctx: Context {
                backend,
                timeouts,
                options,
                resolver,
            },
        }
    }

    /// REST-backed handler; `config.filesystem` is required.
    pub fn from_config(config: &AdapterConfig, credential: Credential) -> Result<Self> {
        config.validate()?;
        let Some(filesystem) = config.filesystem.clone() else {
            return Err(Error::invalid_argument(
                "filesystem",
                "a filesystem name is required for a bound handler",
            ));
        };
        let backend = RestBackend::new(&config.account_name, config.endpoint_url()?, credential)
            .map_err(|e| Error::Backend {
                path: filesystem.clone(),
                source: Box::new(e),
            })?;
        Ok(Self::with_options(
            Arc::new(backend),
            filesystem,
            SharedTimeouts::new(config.timeouts),
            config.handler_options(),
        ))
    }

    #[must_use]
    pub fn account_name(&self) -> &str {
        self.ctx.resolver.account_name()
    }

    #[must_use]
    pub fn filesystem_name(&self) -> &str {
        self.ctx.resolver.bound_filesystem().unwrap_or_default()
    }
}

impl FileSystem for FilesystemHandler {
    fn type_name(&self) -> String {
        format!("abfs+{}/{}", self.account_name(), self.filesystem_name())
    }

    fn timeouts(&self) -> &SharedTimeouts {
        &self.ctx.timeouts
    }

    fn get_file_info(&self, path: &str) -> Result<FileInfo> {
        metadata::get_file_info(&self.ctx, path)
    }

    fn get_file_info_selector(&self, selector: &FileSelector) -> Result<Listing> {
        Listing::new(&self.ctx, selector)
    }

    fn create_dir(&self, path: &str, recursive: bool) -> Result<()> {
        directory::create_dir(&self.ctx, path, recursive)
    }

    fn delete_dir(&self, path: &str, recursive: bool) -> Result<()> {
        directory::delete_dir(&self.ctx, path, recursive)
    }

    fn delete_dir_contents(&self, path: &str, accept_root: bool) -> Result<()> {
        directory::delete_dir_contents(&self.ctx, path, accept_root)
    }

    fn delete_file(&self, path: &str) -> Result<()> {
        directory::delete_file(&self.ctx, path)
    }

    fn move_with(&self, src: &str, dst: &str, overwrite: bool) -> Result<()> {
        directory::move_path(&self.ctx, src, dst, overwrite)
    }

    fn copy_file(&self, src: &str, dst: &str) -> Result<()> {
        directory::copy_file(&self.ctx, src, dst)
    }

    fn open_input_stream(&self, path: &str) -> Result<InputStream> {
        InputStream::open(&self.ctx, path)
    }

    fn open_input_file(&self, path: &str) -> Result<InputStream> {
        InputStream::open_file(&self.ctx, path)
    }

    fn open_output_stream(&self, path: &str, metadata: &[(&str, &str)]) -> Result<OutputStream> {
        OutputStream::create(&self.ctx, path, metadata)
    }

    fn open_append_stream(&self, path: &str, metadata: &[(&str, &str)]) -> Result<OutputStream> {
        OutputStream::append(&self.ctx, path, metadata)
    }
}
