use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::storage::page::PAGE_SIZE;

pub mod reader;
pub mod record;
pub mod recovery;
pub mod writer;

/// Upper bound for one WAL frame. The largest record currently emitted is
/// an UPDATE carrying two near-page-size payloads plus framing.
pub const MAX_WAL_FRAME_LEN: usize = 2 * PAGE_SIZE + 256;

/// The log lives next to the database file as `<path>.wal`.
pub fn wal_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".wal");
    PathBuf::from(name)
}

/// Truncate and fsync the WAL so recovery effects become durable.
pub fn truncate_wal(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    file.sync_all()?;

    // Best-effort directory fsync to persist the size change.
    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
