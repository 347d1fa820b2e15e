use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;
use crate::wal::record::{Seq, WalOp};

/// When the log is forced to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Flush + sync once per committed operation (end of `query()`).
    Normal,
    /// Flush + sync on every append.
    Full,
    /// Never sync; durability is left to the OS.
    Off,
}

/// Append-only logical log. A record must be durable before the page
/// writes it describes become observable as committed.
pub struct WalWriter {
    file: File,
    next_seq: Seq,
    policy: SyncPolicy,
}

impl WalWriter {
    pub fn open(path: &Path, policy: SyncPolicy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(WalWriter {
            file,
            next_seq: 0,
            policy,
        })
    }

    /// Append one operation. Returns the sequence number assigned.
    pub fn append(&mut self, op: &WalOp) -> Result<Seq> {
        let seq = self.next_seq;
        let frame = op.encode(seq)?;
        self.file.write_all(&frame)?;
        if self.policy == SyncPolicy::Full {
            self.file.sync_data()?;
        }
        self.next_seq += 1;
        Ok(seq)
    }

    /// Durability barrier between logging a command's operations and the
    /// page writes they describe. Under `Normal` the whole batch is synced
    /// here; under `Full` every append already was.
    pub fn flush(&mut self) -> Result<()> {
        if self.policy == SyncPolicy::Normal {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Drop the logged operations once their page writes are down. Runs
    /// after every successful query, so a log that survives into recovery
    /// holds at most one command's operations.
    pub fn checkpoint(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        if self.policy != SyncPolicy::Off {
            self.file.sync_all()?;
        }
        self.next_seq = 0;
        Ok(())
    }

    /// Checkpoint variant for clean close: always syncs.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_all()?;
        self.next_seq = 0;
        Ok(())
    }

    pub fn next_seq(&self) -> Seq {
        self.next_seq
    }
}
