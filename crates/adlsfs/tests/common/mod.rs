#![allow(dead_code)]

use adlsfs::{
    AccountHandler, DataLakeBackend, FileSystem, FilesystemHandler, HandlerOptions,
    MemoryBackend, SharedTimeouts,
};
use anyhow::Result;
use std::sync::Arc;

pub const ACCOUNT: &str = "testaccount";
pub const FILESYSTEM: &str = "testfs";

pub struct Fixture {
    pub backend: Arc<MemoryBackend>,
    pub account: AccountHandler,
    pub bound: FilesystemHandler,
}

/// Memory account with one empty filesystem and both handler variants over it
pub fn fixture() -> Fixture {
    fixture_with(HandlerOptions::default(), None)
}

pub fn fixture_with(options: HandlerOptions, page_size: Option<usize>) -> Fixture {
    let backend = Arc::new(MemoryBackend::new(ACCOUNT));
    if let Some(page_size) = page_size {
        backend.set_page_size(page_size);
    }
    backend
        .create_filesystem(FILESYSTEM, None)
        .expect("fresh backend");
    let timeouts = SharedTimeouts::default();
    let account = AccountHandler::with_options(backend.clone(), timeouts.clone(), options);
    let bound =
        FilesystemHandler::with_options(backend.clone(), FILESYSTEM, timeouts, options);
    Fixture {
        backend,
        account,
        bound,
    }
}

pub fn write_file(fs: &dyn FileSystem, path: &str, data: &[u8]) -> Result<()> {
    let mut out = fs.open_output_stream(path, &[])?;
    out.write(data)?;
    out.close()?;
    Ok(())
}

pub fn read_file(fs: &dyn FileSystem, path: &str) -> Result<Vec<u8>> {
    let mut input = fs.open_input_file(path)?;
    let data = input.read_all()?;
    input.close();
    Ok(data.to_vec())
}

/// Paths of a selector's entries, in listing order
pub fn list(fs: &dyn FileSystem, base: &str, recursive: bool) -> Result<Vec<String>> {
    let selector = adlsfs::FileSelector::new(base).recursive(recursive);
    let mut paths = Vec::new();
    for info in fs.get_file_info_selector(&selector)? {
        paths.push(info?.path);
    }
    Ok(paths)
}

/// Depth-3 tree under `root`: 3 intermediate directories and 5 leaves
pub fn build_tree(fs: &dyn FileSystem, root: &str) -> Result<(usize, usize)> {
    fs.create_dir(&format!("{root}/a/b"), true)?;
    fs.create_dir(&format!("{root}/c"), true)?;
    for leaf in ["a/f1", "a/b/f2", "a/b/f3", "c/f4", "f5"] {
        write_file(fs, &format!("{root}/{leaf}"), leaf.as_bytes())?;
    }
    Ok((5, 3))
}
