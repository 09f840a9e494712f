use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use adlsfs::FileSystem;
use anyhow::{Context, Result};
use diagnostics::emit::info as log_info;

/// Downloads a remote file into `local`, replacing it.
pub fn get_command(fs: &dyn FileSystem, remote: &str, local: &Path) -> Result<u64> {
    let mut input = fs.open_input_file(remote)?;
    let mut target = File::create(local)
        .with_context(|| format!("Failed to create local file {}", local.display()))?;
    let copied = io::copy(&mut input, &mut target)?;
    target.flush()?;
    input.close();

    let shown = local.display().to_string();
    log_info!("Downloaded {copied} bytes from {remote} to {shown}");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{memory_fs, put_bytes};

    #[test]
    fn test_get() -> Result<()> {
        let fs = memory_fs();
        put_bytes(&fs, "remote.txt", b"downloaded")?;
        let dir = tempfile::tempdir()?;
        let local = dir.path().join("copy.txt");

        assert_eq!(get_command(&fs, "remote.txt", &local)?, 10);
        assert_eq!(std::fs::read(&local)?, b"downloaded");

        assert!(get_command(&fs, "absent.txt", &dir.path().join("x")).is_err());
        assert!(!dir.path().join("x").exists());
        Ok(())
    }
}
