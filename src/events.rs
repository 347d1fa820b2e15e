use crate::schema::catalog::TableEntry;
use crate::types::Record;

/// Post-commit observer hooks.
///
/// Hooks run synchronously after the mutation has been applied and before
/// `query()` returns. They receive references only and cannot alter database
/// state; a sink that needs to act on events should enqueue work elsewhere.
pub trait EventSink {
    fn on_table_created(&self, _table: &str, _entry: &TableEntry, _raw_query: &str) {}
    fn on_table_dropped(&self, _table: &str, _entry: &TableEntry, _raw_query: &str) {}
    fn on_table_inserted(&self, _table: &str, _records: &[Record], _raw_query: &str) {}
    fn on_table_updated(&self, _table: &str, _records: &[Record], _raw_query: &str) {}
    fn on_table_deleted(&self, _table: &str, _records: &[Record], _raw_query: &str) {}
    fn on_table_selected(&self, _table: &str, _records: &[Record], _raw_query: &str) {}
}

/// Default sink that ignores every event.
pub struct NoopEvents;

impl EventSink for NoopEvents {}
