//! Binlog file validation.

use anyhow::{bail, Context};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Magic bytes at the start of every binlog file (`\xfebin`).
pub const BINLOG_MAGIC: [u8; 4] = [0xfe, 0x62, 0x69, 0x6e];

/// Check that `path` exists and starts with the binlog magic number.
pub fn validate_binlog_file(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        bail!("Binlog file {} does not exist", path.display());
    }

    let mut file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut magic = [0u8; 4];
    if let Err(e) = file.read_exact(&mut magic) {
        bail!(
            "{} is not a valid MySQL binlog file: failed to read magic header: {e}",
            path.display()
        );
    }

    if magic != BINLOG_MAGIC {
        bail!(
            "{} is not a valid MySQL binlog file: incorrect magic number",
            path.display()
        );
    }

    Ok(())
}
