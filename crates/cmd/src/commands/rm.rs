use adlsfs::{FileSystem, FileType};
use anyhow::{Result, anyhow};
use diagnostics::emit::info as log_info;

/// Removes a file, or a directory when `recursive` is set or it is empty.
/// With `force`, a missing path is not an error.
pub fn rm_command(fs: &dyn FileSystem, path: &str, recursive: bool, force: bool) -> Result<()> {
    let info = fs.get_file_info(path)?;
    match info.file_type {
        FileType::NotFound if force => Ok(()),
        FileType::NotFound => Err(anyhow!("No such file or directory: {}", info.path)),
        FileType::File => {
            fs.delete_file(path)?;
            log_info!("Removed {path}");
            Ok(())
        }
        FileType::Directory => {
            fs.delete_dir(path, recursive).map_err(|e| {
                anyhow!("Cannot remove {}: {e} (use -r for non-empty directories)", info.path)
            })?;
            log_info!("Removed directory {path}");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{memory_fs, put_bytes};

    #[test]
    fn test_rm() -> Result<()> {
        let fs = memory_fs();
        put_bytes(&fs, "d/f", b"1")?;
        fs.create_dir("empty", false)?;

        assert!(rm_command(&fs, "d", false, false).is_err());
        rm_command(&fs, "d/f", false, false)?;
        rm_command(&fs, "empty", false, false)?;
        rm_command(&fs, "d", true, false)?;
        assert!(!fs.get_file_info("d")?.exists());

        assert!(rm_command(&fs, "ghost", false, false).is_err());
        rm_command(&fs, "ghost", false, true)?;
        Ok(())
    }
}
