pub mod cat;
pub mod cp;
pub mod get;
pub mod list;
pub mod mkdir;
pub mod mv;
pub mod put;
pub mod rm;
pub mod stat;

pub use cat::cat_command;
pub use cp::cp_command;
pub use get::get_command;
pub use list::list_command;
pub use mkdir::mkdir_command;
pub use mv::mv_command;
pub use put::put_command;
pub use rm::rm_command;
pub use stat::stat_command;

#[cfg(test)]
pub(crate) mod test_support {
    use adlsfs::{DataLakeBackend, FileSystem, FilesystemHandler, MemoryBackend};
    use std::sync::Arc;

    /// Handler bound to an empty in-memory filesystem
    pub fn memory_fs() -> FilesystemHandler {
        let backend = Arc::new(MemoryBackend::new("cliaccount"));
        backend
            .create_filesystem("data", None)
            .expect("fresh backend");
        FilesystemHandler::new(backend, "data")
    }

    pub fn put_bytes(fs: &dyn FileSystem, path: &str, data: &[u8]) -> anyhow::Result<()> {
        let mut out = fs.open_output_stream(path, &[])?;
        out.write(data)?;
        out.close()?;
        Ok(())
    }
}
