use std::io::Write;

use adlsfs::{FileSelector, FileSystem};
use anyhow::Result;
use diagnostics::emit::debug as log_debug;

use crate::common::format_entry;

/// Writes one line per entry under `path`, in listing order.
pub fn list_command(
    fs: &dyn FileSystem,
    path: &str,
    recursive: bool,
    out: &mut dyn Write,
) -> Result<usize> {
    log_debug!("Listing {path} (recursive: {recursive})");

    let selector = FileSelector::new(path).recursive(recursive);
    let mut count = 0;
    for info in fs.get_file_info_selector(&selector)? {
        writeln!(out, "{}", format_entry(&info?))?;
        count += 1;
    }
    Ok(count)
}
