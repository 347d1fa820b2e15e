use crate::exec::cache;
use crate::wal::writer::SyncPolicy;

/// Tunables for a database handle.
#[derive(Debug, Clone)]
pub struct Options {
    /// Write-ahead logging. `None` disables the WAL entirely; otherwise the
    /// chosen policy controls when the log is fsynced.
    pub wal: Option<SyncPolicy>,
    /// Capacity of the pager's decoded-page cache, in pages.
    pub page_cache_capacity: usize,
    /// Capacity of the parsed-command template cache, in entries.
    pub query_cache_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            wal: None,
            page_cache_capacity: 256,
            query_cache_capacity: cache::DEFAULT_CAPACITY,
        }
    }
}

impl Options {
    pub fn with_wal(policy: SyncPolicy) -> Self {
        Options {
            wal: Some(policy),
            ..Options::default()
        }
    }
}
