/// INSERT / UPDATE / DELETE execution.
///
/// Mutations log their logical operation to the WAL before touching any
/// page. Equality predicates on an indexed field narrow the victim scan to
/// the pages hinted by the index; a hinted scan that finds nothing falls
/// back to the full table, since hints may be stale.
use std::collections::BTreeSet;

use crate::error::{Result, SawitError};
use crate::exec::command::{CmpOp, Criteria, Operand};
use crate::exec::{ExecCtx, QueryOutput};
use crate::index::{IndexKey, IndexRegistry};
use crate::schema::catalog;
use crate::storage::heap::HeapFile;
use crate::storage::page::{PageId, MAX_RECORD_LEN};
use crate::types::Record;
use crate::wal::record::WalOp;

/// A mutation must not reach the WAL unless it can be applied: recovery
/// replays every logged operation, so an op that would fail (oversized
/// record) has to be rejected before logging.
fn check_record_fits(record: &Record) -> Result<()> {
    let len = record.to_bytes()?.len();
    if len > MAX_RECORD_LEN {
        return Err(SawitError::RecordTooLarge(len));
    }
    Ok(())
}

/// Pages hinted by an index for a bare equality criteria, if any.
pub(crate) fn hint_pages(
    indexes: &IndexRegistry,
    table: &str,
    criteria: Option<&Criteria>,
) -> Option<BTreeSet<PageId>> {
    let cond = criteria?.as_single()?;
    if cond.op != CmpOp::Eq {
        return None;
    }
    let Operand::Value(value) = &cond.val else {
        return None;
    };
    let index = indexes.find(table, &cond.key)?;
    let entries = index.entries(&IndexKey::from_value(value));
    if entries.is_empty() {
        return None;
    }
    Some(entries.iter().map(|e| e.page_hint).collect())
}

pub(crate) fn exec_insert(
    ctx: &mut ExecCtx,
    table: &str,
    data: &[Record],
    raw: &str,
) -> Result<QueryOutput> {
    if data.is_empty() || data.iter().any(|r| r.is_empty()) {
        return Err(SawitError::Execution(
            "INSERT requires at least one non-empty record".into(),
        ));
    }
    let entry = catalog::find_table(ctx.pager, table)?
        .ok_or_else(|| SawitError::TableMissing(table.to_string()))?;

    for record in data {
        check_record_fits(record)?;
    }
    for record in data {
        ctx.log(&WalOp::Insert {
            table: table.to_string(),
            record: record.clone(),
        })?;
    }
    ctx.flush_wal()?;

    let mut heap = HeapFile::open(&entry);
    let count = heap.insert_many(ctx.pager, ctx.indexes, data)?;

    ctx.events.on_table_inserted(table, data, raw);
    Ok(QueryOutput::Message(format!(
        "Inserted {} record(s) into '{}'",
        count, table
    )))
}

pub(crate) fn exec_delete(
    ctx: &mut ExecCtx,
    table: &str,
    criteria: Option<&Criteria>,
    raw: &str,
) -> Result<QueryOutput> {
    let entry = catalog::find_table(ctx.pager, table)?
        .ok_or_else(|| SawitError::TableMissing(table.to_string()))?;
    let heap = HeapFile::open(&entry);

    let victims = find_victims(ctx, &heap, table, criteria)?;
    for (_, old) in &victims {
        ctx.log(&WalOp::Delete {
            table: table.to_string(),
            old: old.clone(),
        })?;
    }
    ctx.flush_wal()?;

    let count = heap.remove_records(ctx.pager, ctx.indexes, &victims)?;

    let removed: Vec<Record> = victims.into_iter().map(|(_, r)| r).collect();
    ctx.events.on_table_deleted(table, &removed, raw);
    Ok(QueryOutput::Message(format!(
        "Deleted {} record(s) from '{}'",
        count, table
    )))
}

pub(crate) fn exec_update(
    ctx: &mut ExecCtx,
    table: &str,
    updates: &Record,
    criteria: Option<&Criteria>,
    raw: &str,
) -> Result<QueryOutput> {
    let entry = catalog::find_table(ctx.pager, table)?
        .ok_or_else(|| SawitError::TableMissing(table.to_string()))?;
    let mut heap = HeapFile::open(&entry);

    let victims = find_victims(ctx, &heap, table, criteria)?;

    if updates.is_empty() {
        // No-op on visible state; still reports how many rows matched.
        return Ok(QueryOutput::Message(format!(
            "Updated {} record(s) in '{}'",
            victims.len(),
            table
        )));
    }

    for (_, old) in &victims {
        check_record_fits(&old.merged(updates))?;
    }
    for (_, old) in &victims {
        ctx.log(&WalOp::Update {
            table: table.to_string(),
            old: old.clone(),
            new: old.merged(updates),
        })?;
    }
    ctx.flush_wal()?;

    let results = heap.update_records(ctx.pager, ctx.indexes, &victims, updates)?;

    ctx.events.on_table_updated(table, &results, raw);
    Ok(QueryOutput::Message(format!(
        "Updated {} record(s) in '{}'",
        results.len(),
        table
    )))
}

/// Matching rows with their pages, trying the index-hinted pages first.
fn find_victims(
    ctx: &mut ExecCtx,
    heap: &HeapFile,
    table: &str,
    criteria: Option<&Criteria>,
) -> Result<Vec<(PageId, Record)>> {
    if let Some(pages) = hint_pages(ctx.indexes, table, criteria) {
        let victims = heap.find_matching(ctx.pager, criteria, Some(&pages))?;
        if !victims.is_empty() {
            return Ok(victims);
        }
        // Stale hints: fall through to the full scan.
    }
    heap.find_matching(ctx.pager, criteria, None)
}
