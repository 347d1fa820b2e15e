/// DDL and metadata commands: CREATE/DROP TABLE, CREATE INDEX, SHOW.
use crate::error::{Result, SawitError};
use crate::exec::command::Criteria;
use crate::exec::{ExecCtx, QueryOutput};
use crate::index::{Index, IndexKey};
use crate::schema::catalog::{self, INDEXES_TABLE};
use crate::schema::names;
use crate::storage::heap::HeapFile;
use crate::types::{Record, Value};
use crate::wal::record::WalOp;

pub(crate) fn exec_create_table(
    ctx: &mut ExecCtx,
    table: &str,
    raw: &str,
) -> Result<QueryOutput> {
    names::validate_table_name(table)?;
    if catalog::find_table(ctx.pager, table)?.is_some() {
        // Existing table is informational, not an error.
        return Ok(QueryOutput::Message(format!(
            "Table '{}' already exists",
            table
        )));
    }
    if catalog::list_tables(ctx.pager)?.len() >= catalog::MAX_TABLES {
        return Err(SawitError::PageZeroFull);
    }

    ctx.log(&WalOp::CreateTable {
        table: table.to_string(),
    })?;
    ctx.flush_wal()?;
    let entry = catalog::create_table(ctx.pager, table, false)?;

    ctx.events.on_table_created(table, &entry, raw);
    Ok(QueryOutput::Message(format!("Table '{}' created", table)))
}

pub(crate) fn exec_drop_table(ctx: &mut ExecCtx, table: &str, raw: &str) -> Result<QueryOutput> {
    if table == INDEXES_TABLE {
        return Err(SawitError::Execution(format!(
            "cannot drop system table '{}'",
            INDEXES_TABLE
        )));
    }
    if catalog::find_table(ctx.pager, table)?.is_none() {
        return Ok(QueryOutput::Message(format!(
            "Table '{}' does not exist",
            table
        )));
    }

    ctx.log(&WalOp::DropTable {
        table: table.to_string(),
    })?;
    ctx.flush_wal()?;
    let entry = catalog::drop_table(ctx.pager, table)?;
    ctx.indexes.remove_table(table);
    remove_index_rows(ctx, table)?;

    ctx.events.on_table_dropped(table, &entry, raw);
    Ok(QueryOutput::Message(format!("Table '{}' dropped", table)))
}

/// Drop the `_indexes` rows belonging to a dropped table.
fn remove_index_rows(ctx: &mut ExecCtx, table: &str) -> Result<()> {
    let Some(entry) = catalog::find_table(ctx.pager, INDEXES_TABLE)? else {
        return Ok(());
    };
    let heap = HeapFile::open(&entry);
    let criteria = Criteria::eq("table", Value::Str(table.to_string()));
    let victims = heap.find_matching(ctx.pager, Some(&criteria), None)?;
    if !victims.is_empty() {
        heap.remove_records(ctx.pager, ctx.indexes, &victims)?;
    }
    Ok(())
}

pub(crate) fn exec_create_index(
    ctx: &mut ExecCtx,
    table: &str,
    field: &str,
) -> Result<QueryOutput> {
    names::validate_field_name(field)?;
    let entry = catalog::find_table(ctx.pager, table)?
        .ok_or_else(|| SawitError::TableMissing(table.to_string()))?;

    if ctx.indexes.contains(table, field) {
        return Ok(QueryOutput::Message(format!(
            "Index on '{}.{}' already exists",
            table, field
        )));
    }

    ctx.log(&WalOp::CreateIndex {
        table: table.to_string(),
        field: field.to_string(),
    })?;
    ctx.flush_wal()?;

    // Build from a raw scan so every entry carries its page hint.
    let mut index = Index::new(table, field);
    for (page, record) in HeapFile::open(&entry).scan_raw(ctx.pager)? {
        if let Some(value) = record.get(field) {
            index.insert(IndexKey::from_value(value), record.clone(), page);
        }
    }
    ctx.indexes.add(index);

    let indexes_entry = catalog::ensure_indexes_table(ctx.pager)?;
    let row = Record::from_pairs([
        ("table", Value::Str(table.to_string())),
        ("field", Value::Str(field.to_string())),
    ]);
    HeapFile::open(&indexes_entry).insert_many(ctx.pager, ctx.indexes, &[row])?;

    Ok(QueryOutput::Message(format!(
        "Index created on '{}.{}'",
        table, field
    )))
}

/// User tables only; internal `_`-prefixed tables stay hidden.
pub(crate) fn exec_show_tables(ctx: &mut ExecCtx) -> Result<QueryOutput> {
    let rows: Vec<Record> = catalog::list_tables(ctx.pager)?
        .into_iter()
        .filter(|entry| !names::is_internal(&entry.name))
        .map(|entry| Record::from_pairs([("table", Value::Str(entry.name))]))
        .collect();
    Ok(QueryOutput::Rows(rows))
}

pub(crate) fn exec_show_indexes(ctx: &mut ExecCtx, table: Option<&str>) -> Result<QueryOutput> {
    let stats: Vec<_> = match table {
        Some(t) => ctx.indexes.for_table(t).map(|i| i.stats()).collect(),
        None => ctx.indexes.stats(),
    };
    let rows: Vec<Record> = stats
        .into_iter()
        .map(|stats| {
            Record::from_pairs([
                ("name", Value::Str(stats.name)),
                ("field", Value::Str(stats.key_field)),
                ("size", Value::Int(stats.size as i64)),
            ])
        })
        .collect();
    Ok(QueryOutput::Rows(rows))
}
