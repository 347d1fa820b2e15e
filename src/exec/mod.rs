/// Command execution.
///
/// `dispatch` is the single entry point: it validates that the command is
/// fully bound, routes to the per-command handlers and fires event hooks.
/// Anything that fails bubbles up as a `SawitError` and is turned into an
/// `Error: ...` message at the `query()` boundary.
use crate::error::Result;
use crate::events::EventSink;
use crate::exec::command::Command;
use crate::exec::explain::Plan;
use crate::index::IndexRegistry;
use crate::storage::pager::Pager;
use crate::types::Record;
use crate::wal::record::WalOp;
use crate::wal::writer::WalWriter;

pub mod aggregate;
pub mod cache;
pub mod command;
pub mod ddl;
pub mod eval;
pub mod explain;
pub mod join;
pub mod mutation;
pub mod select;

/// What a command evaluates to.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Human-readable confirmation or error text.
    Message(String),
    /// SELECT / SHOW results and grouped aggregates.
    Rows(Vec<Record>),
    /// Ungrouped aggregate result.
    Row(Record),
    /// EXPLAIN output.
    Plan(Plan),
}

pub(crate) struct ExecCtx<'a> {
    pub pager: &'a mut Pager,
    pub indexes: &'a mut IndexRegistry,
    pub wal: Option<&'a mut WalWriter>,
    pub events: &'a dyn EventSink,
}

impl ExecCtx<'_> {
    /// Append the logical operation to the WAL, when one is attached.
    /// Must run before the page writes it describes.
    pub(crate) fn log(&mut self, op: &WalOp) -> Result<()> {
        if let Some(wal) = self.wal.as_deref_mut() {
            wal.append(op)?;
        }
        Ok(())
    }

    /// Make the logged operations durable before any page write. Handlers
    /// call this between their logging loop and the heap mutation.
    pub(crate) fn flush_wal(&mut self) -> Result<()> {
        if let Some(wal) = self.wal.as_deref_mut() {
            wal.flush()?;
        }
        Ok(())
    }
}

pub(crate) fn dispatch(ctx: &mut ExecCtx, command: &Command, raw: &str) -> Result<QueryOutput> {
    cache::check_fully_bound(command)?;

    match command {
        Command::CreateTable { table } => ddl::exec_create_table(ctx, table, raw),
        Command::ShowTables => ddl::exec_show_tables(ctx),
        Command::ShowIndexes { table } => ddl::exec_show_indexes(ctx, table.as_deref()),
        Command::Insert { table, data } => mutation::exec_insert(ctx, table, data, raw),
        Command::Select {
            table,
            cols,
            criteria,
            sort,
            limit,
            offset,
            joins,
            distinct,
        } => {
            let rows = select::exec_select(
                ctx.pager,
                ctx.indexes,
                table,
                cols,
                criteria.as_ref(),
                sort.as_ref(),
                *limit,
                *offset,
                joins,
                *distinct,
            )?;
            ctx.events.on_table_selected(table, &rows, raw);
            Ok(QueryOutput::Rows(rows))
        }
        Command::Delete { table, criteria } => {
            mutation::exec_delete(ctx, table, criteria.as_ref(), raw)
        }
        Command::Update {
            table,
            updates,
            criteria,
        } => mutation::exec_update(ctx, table, updates, criteria.as_ref(), raw),
        Command::DropTable { table } => ddl::exec_drop_table(ctx, table, raw),
        Command::CreateIndex { table, field } => ddl::exec_create_index(ctx, table, field),
        Command::Aggregate {
            table,
            func,
            field,
            criteria,
            group_by,
            having,
        } => aggregate::exec_aggregate(
            ctx.pager,
            table,
            *func,
            field.as_deref(),
            criteria.as_ref(),
            group_by.as_deref(),
            having.as_ref(),
        ),
        Command::Explain(inner) => exec_explain_boxed(ctx, inner),
        Command::Error { message } => Ok(QueryOutput::Message(format!("Error: {}", message))),
    }
}

fn exec_explain_boxed(ctx: &mut ExecCtx, inner: &Command) -> Result<QueryOutput> {
    explain::exec_explain(ctx, inner).map(QueryOutput::Plan)
}
