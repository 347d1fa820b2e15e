//! SawitDB: embedded single-file relational store.
//!
//! A paged heap-file layout with:
//! - 4 KiB pages; page 0 holds the table directory
//! - per-table linked chains of record pages (length-prefixed JSON records)
//! - in-memory secondary indexes rebuilt at open, persisted via `_indexes`
//! - optional write-ahead log with replay-on-open crash recovery
//! - a query executor covering joins, aggregation, sorting, pagination and
//!   plan explanation
//!
//! The SQL tokenizer/parser, CLI and network layers live outside this
//! crate; they feed the executor a [`Command`] and the raw query text.

pub mod config;
pub mod error;
pub mod events;
pub mod exec;
pub mod index;
pub mod schema;
pub mod storage;
pub mod types;
pub mod wal;

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs4::fs_std::FileExt;
use tracing::debug;

pub use config::Options;
pub use error::{Result, SawitError};
pub use events::{EventSink, NoopEvents};
pub use exec::cache::bind_params;
pub use exec::command::{
    AggFunc, CmpOp, Command, Condition, Criteria, JoinSpec, JoinType, Logic, OnClause, Operand,
    Projection, SortDir, SortSpec,
};
pub use exec::explain::{JoinMethod, Plan, PlanStep, ScanMethod};
pub use exec::QueryOutput;
pub use types::{Record, Value};
pub use wal::writer::SyncPolicy;

use crate::exec::cache::QueryCache;
use crate::exec::ExecCtx;
use crate::index::{Index, IndexKey, IndexRegistry};
use crate::schema::catalog::{self, INDEXES_TABLE};
use crate::storage::heap::HeapFile;
use crate::storage::pager::Pager;
use crate::wal::writer::WalWriter;

/// Main database handle. One handle owns one file; handles to different
/// files are fully independent. Two handles on the same file are not
/// supported and are refused via an advisory file lock.
pub struct Database {
    pager: Pager,
    indexes: IndexRegistry,
    wal: Option<WalWriter>,
    cache: QueryCache,
    events: Box<dyn EventSink>,
    #[allow(dead_code)]
    lock_file: File,
    closed: bool,
}

impl Database {
    /// Open (or create) a database with default options: no WAL, default
    /// cache sizes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, Options::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: Options) -> Result<Self> {
        let path = path.as_ref();

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path.with_extension("lock"))?;
        lock_file.try_lock_exclusive().map_err(|e| {
            SawitError::Lock(format!("database '{}' is in use: {}", path.display(), e))
        })?;

        let mut pager = Pager::open(path, options.page_cache_capacity)?;

        // Replay and drain any log left behind by a crash before the file
        // is visible to queries.
        let wal_path = wal::wal_path(path);
        if wal_path.exists() && std::fs::metadata(&wal_path)?.len() > 0 {
            wal::recovery::recover(&mut pager, &wal_path)?;
            wal::truncate_wal(&wal_path)?;
        }

        catalog::ensure_indexes_table(&mut pager)?;
        let indexes = rebuild_indexes(&mut pager)?;

        let wal = match options.wal {
            Some(policy) => Some(WalWriter::open(&wal_path, policy)?),
            None => None,
        };

        Ok(Database {
            pager,
            indexes,
            wal,
            cache: QueryCache::new(options.query_cache_capacity),
            events: Box::new(NoopEvents),
            lock_file,
            closed: false,
        })
    }

    /// Install the post-commit hook set. Replaces the default no-op sink.
    pub fn set_event_sink(&mut self, sink: Box<dyn EventSink>) {
        self.events = sink;
    }

    /// Execute a command, returning the typed result. `raw` is the original
    /// query text, passed through to event hooks.
    pub fn execute(&mut self, command: &Command, raw: &str) -> Result<QueryOutput> {
        if self.closed {
            return Err(SawitError::HandleClosed);
        }

        let mut ctx = ExecCtx {
            pager: &mut self.pager,
            indexes: &mut self.indexes,
            wal: self.wal.as_mut(),
            events: self.events.as_ref(),
        };
        let output = exec::dispatch(&mut ctx, command, raw)?;

        // The query's page writes are down; its log entries have served
        // their purpose. Checkpointing here bounds recovery to replaying
        // at most one command. A failed dispatch skips this, leaving the
        // log for roll-forward at next open.
        if let Some(wal) = self.wal.as_mut() {
            wal.checkpoint()?;
        }
        Ok(output)
    }

    /// Execute a command, folding failures into an `Error: ...` message.
    pub fn query(&mut self, command: &Command, raw: &str) -> QueryOutput {
        match self.execute(command, raw) {
            Ok(output) => output,
            Err(e) => QueryOutput::Message(format!("Error: {}", e)),
        }
    }

    /// Cached parsed template for a raw query string, cloned on hit.
    pub fn cached_command(&mut self, raw: &str) -> Option<Command> {
        self.cache.get(raw)
    }

    /// Cache a parsed template. Templates are stored unbound; use
    /// [`bind_params`] on the retrieved clone.
    pub fn cache_command(&mut self, raw: &str, command: Command) {
        self.cache.put(raw, command);
    }

    /// Flush everything and invalidate the handle. A clean close drains the
    /// WAL; subsequent calls fail with `HandleClosed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.pager.sync()?;
        if let Some(wal) = self.wal.as_mut() {
            wal.truncate()?;
        }
        self.closed = true;
        Ok(())
    }
}

/// Rebuild every index recorded in `_indexes` by scanning its table.
/// Page hints are seeded from the scan.
fn rebuild_indexes(pager: &mut Pager) -> Result<IndexRegistry> {
    let mut registry = IndexRegistry::new();
    let Some(entry) = catalog::find_table(pager, INDEXES_TABLE)? else {
        return Ok(registry);
    };

    let definitions = HeapFile::open(&entry).scan(pager, None, None)?;
    for def in definitions {
        let (Some(Value::Str(table)), Some(Value::Str(field))) =
            (def.get("table"), def.get("field"))
        else {
            continue;
        };
        let Some(table_entry) = catalog::find_table(pager, table)? else {
            continue;
        };

        let mut index = Index::new(table, field);
        for (page, record) in HeapFile::open(&table_entry).scan_raw(pager)? {
            if let Some(value) = record.get(field) {
                index.insert(IndexKey::from_value(value), record.clone(), page);
            }
        }
        debug!(table = %table, field = %field, size = index.len(), "index rebuilt");
        registry.add(index);
    }
    Ok(registry)
}
