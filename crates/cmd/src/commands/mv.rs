use adlsfs::FileSystem;
use anyhow::Result;

pub fn mv_command(fs: &dyn FileSystem, src: &str, dst: &str, overwrite: bool) -> Result<()> {
    fs.move_with(src, dst, overwrite)?;
    Ok(())
}
