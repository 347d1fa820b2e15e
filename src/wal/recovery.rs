/// WAL replay on open.
///
/// Page writes are best-effort synced as they happen, so by the time
/// recovery runs an operation may be (a) fully on disk, (b) partially on
/// disk, or (c) absent. Replay therefore checks for each operation whether
/// its effect is already visible and only applies the missing ones; the
/// result is a state where no operation is half-applied or applied twice.
///
/// Indexes are not maintained here: the registry is rebuilt from scratch
/// right after recovery, so replay only needs the catalog and the heaps.
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;
use crate::index::IndexRegistry;
use crate::schema::catalog::{self, INDEXES_TABLE};
use crate::schema::names;
use crate::storage::heap::HeapFile;
use crate::storage::pager::Pager;
use crate::types::{Record, Value};
use crate::wal::reader::WalReader;
use crate::wal::record::WalOp;

/// Replay the log at `wal_path` against the database in `pager`. Stops at
/// the first invalid frame, keeping everything applied before it. Returns
/// the number of operations applied.
pub fn recover(pager: &mut Pager, wal_path: &Path) -> Result<usize> {
    let mut reader = WalReader::open(wal_path)?;
    let mut applied = 0usize;
    let mut seen = 0usize;

    loop {
        match reader.next() {
            Ok(Some((seq, op))) => {
                seen += 1;
                if apply_op(pager, &op)? {
                    applied += 1;
                } else {
                    debug!(seq, "recovery: operation already on disk, skipped");
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "recovery stopped at invalid WAL record");
                break;
            }
        }
    }

    debug!(seen, applied, "WAL recovery complete");
    Ok(applied)
}

/// Apply one logged operation unless its effect is already present.
/// Returns whether anything was written.
fn apply_op(pager: &mut Pager, op: &WalOp) -> Result<bool> {
    // Replay runs before the index registry exists.
    let mut no_indexes = IndexRegistry::new();

    match op {
        WalOp::CreateTable { table } => {
            if catalog::find_table(pager, table)?.is_some() {
                return Ok(false);
            }
            catalog::create_table(pager, table, names::is_internal(table))?;
            Ok(true)
        }
        WalOp::DropTable { table } => {
            if catalog::find_table(pager, table)?.is_none() {
                return Ok(false);
            }
            catalog::drop_table(pager, table)?;
            remove_index_rows(pager, table)?;
            Ok(true)
        }
        WalOp::CreateIndex { table, field } => {
            let entry = catalog::ensure_indexes_table(pager)?;
            let row = index_row(table, field);
            let heap = HeapFile::open(&entry);
            if find_instance(&heap, pager, &row)?.is_some() {
                return Ok(false);
            }
            HeapFile::open(&entry).insert_many(pager, &mut no_indexes, &[row])?;
            Ok(true)
        }
        WalOp::Insert { table, record } => {
            let Some(entry) = catalog::find_table(pager, table)? else {
                return Ok(false);
            };
            let heap = HeapFile::open(&entry);
            if find_instance(&heap, pager, record)?.is_some() {
                return Ok(false);
            }
            HeapFile::open(&entry).insert_many(pager, &mut no_indexes, &[record.clone()])?;
            Ok(true)
        }
        WalOp::Update { table, old, new } => {
            let Some(entry) = catalog::find_table(pager, table)? else {
                return Ok(false);
            };
            let heap = HeapFile::open(&entry);
            if find_instance(&heap, pager, new)?.is_some() {
                return Ok(false);
            }
            let Some(victim) = find_instance(&heap, pager, old)? else {
                return Ok(false);
            };
            heap.remove_records(pager, &mut no_indexes, &[victim])?;
            HeapFile::open(&entry).insert_many(pager, &mut no_indexes, &[new.clone()])?;
            Ok(true)
        }
        WalOp::Delete { table, old } => {
            let Some(entry) = catalog::find_table(pager, table)? else {
                return Ok(false);
            };
            let heap = HeapFile::open(&entry);
            let Some(victim) = find_instance(&heap, pager, old)? else {
                return Ok(false);
            };
            heap.remove_records(pager, &mut no_indexes, &[victim])?;
            Ok(true)
        }
    }
}

fn index_row(table: &str, field: &str) -> Record {
    Record::from_pairs([
        ("table", Value::Str(table.to_string())),
        ("field", Value::Str(field.to_string())),
    ])
}

/// First heap occurrence of an exact record, if any.
fn find_instance(
    heap: &HeapFile,
    pager: &mut Pager,
    record: &Record,
) -> Result<Option<(u32, Record)>> {
    Ok(heap
        .scan_raw(pager)?
        .into_iter()
        .find(|(_, r)| r == record))
}

fn remove_index_rows(pager: &mut Pager, table: &str) -> Result<()> {
    let Some(entry) = catalog::find_table(pager, INDEXES_TABLE)? else {
        return Ok(());
    };
    let heap = HeapFile::open(&entry);
    let victims: Vec<(u32, Record)> = heap
        .scan_raw(pager)?
        .into_iter()
        .filter(|(_, r)| r.get("table") == Some(&Value::Str(table.to_string())))
        .collect();
    if !victims.is_empty() {
        heap.remove_records(pager, &mut IndexRegistry::new(), &victims)?;
    }
    Ok(())
}
