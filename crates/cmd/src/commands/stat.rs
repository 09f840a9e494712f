use std::io::Write;

use adlsfs::FileSystem;
use anyhow::{Result, anyhow};

use crate::common::format_entry;

pub fn stat_command(fs: &dyn FileSystem, path: &str, out: &mut dyn Write) -> Result<()> {
    let info = fs.get_file_info(path)?;
    if !info.exists() {
        return Err(anyhow!("No such file or directory: {}", info.path));
    }
    writeln!(out, "{}", format_entry(&info))?;
    Ok(())
}
