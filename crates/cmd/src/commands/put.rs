use std::fs::File;
use std::io;
use std::path::Path;

use adlsfs::FileSystem;
use anyhow::{Context, Result};
use diagnostics::emit::info as log_info;

/// Uploads a local file. The remote object appears only once the upload
/// has been committed.
pub fn put_command(
    fs: &dyn FileSystem,
    local: &Path,
    remote: &str,
    content_type: Option<&str>,
    append: bool,
) -> Result<u64> {
    let mut source = File::open(local)
        .with_context(|| format!("Failed to open local file {}", local.display()))?;

    let metadata: Vec<(&str, &str)> = content_type
        .map(|ct| vec![("Content-Type", ct)])
        .unwrap_or_default();
    let mut out = if append {
        fs.open_append_stream(remote, &metadata)?
    } else {
        fs.open_output_stream(remote, &metadata)?
    };

    // A failed copy drops the stream, which discards the upload
    let copied = io::copy(&mut source, &mut out)?;
    out.close()?;

    let target = out.path();
    log_info!("Uploaded {copied} bytes to {target}");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::cat_command;
    use crate::commands::test_support::memory_fs;
    use std::io::Write;

    #[test]
    fn test_put_and_append() -> Result<()> {
        let fs = memory_fs();
        let mut local = tempfile::NamedTempFile::new()?;
        local.write_all(b"a,b\n1,2\n")?;

        assert_eq!(put_command(&fs, local.path(), "t.csv", Some("text/csv"), false)?, 8);
        assert_eq!(put_command(&fs, local.path(), "t.csv", None, true)?, 8);

        let mut out = Vec::new();
        cat_command(&fs, "t.csv", &mut out)?;
        assert_eq!(out, b"a,b\n1,2\na,b\n1,2\n");
        Ok(())
    }

    #[test]
    fn test_put_missing_local_file() {
        let fs = memory_fs();
        let err = put_command(&fs, Path::new("/definitely/not/here"), "x", None, false);
        assert!(err.is_err());
        assert!(!fs.get_file_info("x").is_ok_and(|i| i.exists()));
    }
}
