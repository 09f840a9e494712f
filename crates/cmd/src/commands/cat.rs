use std::io::{self, Write};

use adlsfs::FileSystem;
use anyhow::Result;
use diagnostics::emit::debug as log_debug;

/// Streams a remote file to `out`; returns the number of bytes copied.
pub fn cat_command(fs: &dyn FileSystem, path: &str, out: &mut dyn Write) -> Result<u64> {
    let mut input = fs.open_input_file(path)?;
    let copied = io::copy(&mut input, out)?;
    input.close();
    log_debug!("Streamed {copied} bytes from {path}");
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{memory_fs, put_bytes};

    #[test]
    fn test_cat() -> Result<()> {
        let fs = memory_fs();
        let body: Vec<u8> = (0..=255u8).cycle().take(3 * 1024 * 1024).collect();
        put_bytes(&fs, "big.bin", &body)?;

        let mut out = Vec::new();
        assert_eq!(cat_command(&fs, "big.bin", &mut out)?, body.len() as u64);
        assert_eq!(out, body);

        fs.create_dir("d", false)?;
        assert!(cat_command(&fs, "d", &mut Vec::new()).is_err());
        assert!(cat_command(&fs, "missing", &mut Vec::new()).is_err());
        Ok(())
    }
}
