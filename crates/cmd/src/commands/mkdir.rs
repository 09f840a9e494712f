use adlsfs::FileSystem;
use anyhow::Result;
use diagnostics::emit::debug as log_debug;

pub fn mkdir_command(fs: &dyn FileSystem, path: &str, parents: bool) -> Result<()> {
    log_debug!("Creating directory {path} (parents: {parents})");
    fs.create_dir(path, parents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::memory_fs;

    #[test]
    fn test_mkdir() -> Result<()> {
        let fs = memory_fs();
        assert!(mkdir_command(&fs, "a/b", false).is_err());
        mkdir_command(&fs, "a/b", true)?;
        assert!(fs.get_file_info("a/b")?.is_dir());
        mkdir_command(&fs, "a/c", false)?;
        Ok(())
    }
}
