use adlsfs::FileSystem;
use anyhow::Result;

/// Server-side paths on both ends; the bytes stream through this process.
pub fn cp_command(fs: &dyn FileSystem, src: &str, dst: &str) -> Result<()> {
    fs.copy_file(src, dst)?;
    Ok(())
}
