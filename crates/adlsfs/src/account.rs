//! Handler spanning every filesystem of a storage account.
//!
//! Paths name the filesystem as their first segment (`data/year=2024/x`);
//! the account root lists filesystems, and creating or deleting a
//! top-level directory creates or deletes a filesystem.

use crate::backend::DataLakeBackend;
use crate::config::AdapterConfig;
use crate::directory;
use crate::error::{Error, Result};
use crate::filesystem::FilesystemHandler;
use crate::handler::{Context, FileInfo, FileSelector, FileSystem, HandlerOptions};
use crate::metadata::{self, Listing};
use crate::path::PathResolver;
use crate::reader::InputStream;
use crate::rest::{Credential, RestBackend};
use crate::timeouts::SharedTimeouts;
use crate::writer::OutputStream;
use std::sync::Arc;

#[derive(Clone)]
pub struct AccountHandler {
    ctx: Context,
}

impl AccountHandler {
    pub fn new(backend: Arc<dyn DataLakeBackend>) -> Self {
        Self::with_options(backend, SharedTimeouts::default(), HandlerOptions::default())
    }

    pub fn with_options(
        backend: Arc<dyn DataLakeBackend>,
        timeouts: SharedTimeouts,
        options: HandlerOptions,
    ) -> Self {
        let resolver = PathResolver::account(backend.account_name());
        Self {
            ctx: Context {
                backend,
                timeouts,
                options,
                resolver,
            },
        }
    }

    /// REST-backed handler for `config.account_name`. A `filesystem` in the
    /// config is ignored here; see [`FilesystemHandler::from_config`].
    pub fn from_config(config: &AdapterConfig, credential: Credential) -> Result<Self> {
        config.validate()?;
        let backend = RestBackend::new(&config.account_name, config.endpoint_url()?, credential)
            .map_err(|e| Error::Backend {
                path: String::new(),
                source: Box::new(e),
            })?;
        Ok(Self::with_options(
            Arc::new(backend),
            SharedTimeouts::new(config.timeouts),
            config.handler_options(),
        ))
    }

    #[must_use]
    pub fn account_name(&self) -> &str {
        self.ctx.resolver.account_name()
    }

    /// Handler pinned to `name`, sharing this handler's backend and timeout cells.
    #[must_use]
    pub fn filesystem(&self, name: &str) -> FilesystemHandler {
        FilesystemHandler::with_options(
            Arc::clone(&self.ctx.backend),
            name,
            self.ctx.timeouts.clone(),
            self.ctx.options,
        )
    }
}

impl FileSystem for AccountHandler {
    fn type_name(&self) -> String {
        format!("abfs+{}", self.account_name())
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
