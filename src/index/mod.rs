/// In-memory secondary indexes.
///
/// Each index is an ordered key -> bucket map over one field of one table.
/// Buckets hold the record contents plus a page hint: the heap page the
/// record was last seen on. Hints only narrow mutation scans and may go
/// stale; callers fall back to a full scan when a hinted page misses.
///
/// Index existence is persisted as `{table, field}` rows in `_indexes`;
/// the maps themselves are rebuilt by a full table scan at open.
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::storage::page::PageId;
use crate::types::{Record, Value};

/// Index key with a deterministic total order across value types:
/// null < numbers (numeric order) < strings (lexicographic) < booleans.
#[derive(Debug, Clone)]
pub enum IndexKey {
    Null,
    Num(f64),
    Str(String),
    Bool(bool),
}

impl IndexKey {
    pub fn from_value(value: &Value) -> IndexKey {
        match value {
            Value::Null => IndexKey::Null,
            Value::Bool(b) => IndexKey::Bool(*b),
            Value::Int(n) => IndexKey::Num(*n as f64),
            Value::Float(n) => {
                // Collapse -0.0 so it shares a bucket with 0.
                IndexKey::Num(if *n == 0.0 { 0.0 } else { *n })
            }
            Value::Str(s) => IndexKey::Str(s.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IndexKey::Null => 0,
            IndexKey::Num(_) => 1,
            IndexKey::Str(_) => 2,
            IndexKey::Bool(_) => 3,
        }
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Num(a), IndexKey::Num(b)) => a.total_cmp(b),
            (IndexKey::Str(a), IndexKey::Str(b)) => a.cmp(b),
            (IndexKey::Bool(a), IndexKey::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub record: Record,
    pub page_hint: PageId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub name: String,
    pub key_field: String,
    pub size: usize,
}

pub struct Index {
    pub table: String,
    pub field: String,
    map: BTreeMap<IndexKey, Vec<IndexEntry>>,
}

impl Index {
    pub fn new(table: &str, field: &str) -> Self {
        Index {
            table: table.to_string(),
            field: field.to_string(),
            map: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> String {
        format!("idx_{}_{}", self.table, self.field)
    }

    pub fn insert(&mut self, key: IndexKey, record: Record, page_hint: PageId) {
        self.map
            .entry(key)
            .or_default()
            .push(IndexEntry { record, page_hint });
    }

    /// Remove one bucket entry matching `record` by deep equality. The key
    /// is dropped when its bucket empties.
    pub fn delete(&mut self, key: &IndexKey, record: &Record) -> bool {
        let Some(bucket) = self.map.get_mut(key) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|e| &e.record == record) else {
            return false;
        };
        bucket.remove(pos);
        if bucket.is_empty() {
            self.map.remove(key);
        }
        true
    }

    /// Replace an entry's contents in place (key unchanged). Used when an
    /// update touches other fields of an indexed record.
    pub fn refresh(&mut self, key: &IndexKey, old: &Record, new: &Record, page_hint: PageId) -> bool {
        let Some(bucket) = self.map.get_mut(key) else {
            return false;
        };
        let Some(entry) = bucket.iter_mut().find(|e| &e.record == old) else {
            return false;
        };
        entry.record = new.clone();
        entry.page_hint = page_hint;
        true
    }

    pub fn search(&self, key: &IndexKey) -> Vec<Record> {
        self.map
            .get(key)
            .map(|bucket| bucket.iter().map(|e| e.record.clone()).collect())
            .unwrap_or_default()
    }

    pub fn entries(&self, key: &IndexKey) -> &[IndexEntry] {
        self.map.get(key).map(|b| b.as_slice()).unwrap_or(&[])
    }

    /// Total number of record references held.
    pub fn len(&self) -> usize {
        self.map.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            name: self.name(),
            key_field: self.field.clone(),
            size: self.len(),
        }
    }
}

/// All live indexes of one database handle.
#[derive(Default)]
pub struct IndexRegistry {
    indexes: Vec<Index>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        IndexRegistry::default()
    }

    pub fn add(&mut self, index: Index) {
        self.indexes.push(index);
    }

    pub fn find(&self, table: &str, field: &str) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|i| i.table == table && i.field == field)
    }

    pub fn contains(&self, table: &str, field: &str) -> bool {
        self.find(table, field).is_some()
    }

    pub fn for_table(&self, table: &str) -> impl Iterator<Item = &Index> {
        let table = table.to_string();
        self.indexes.iter().filter(move |i| i.table == table)
    }

    pub fn for_table_mut(&mut self, table: &str) -> impl Iterator<Item = &mut Index> {
        let table = table.to_string();
        self.indexes.iter_mut().filter(move |i| i.table == table)
    }

    pub fn remove_table(&mut self, table: &str) {
        self.indexes.retain(|i| i.table != table);
    }

    pub fn stats(&self) -> Vec<IndexStats> {
        self.indexes.iter().map(|i| i.stats()).collect()
    }

    /// Maintenance step after a heap insert: every index on the table whose
    /// field is present in the record receives the record with a page hint.
    pub fn record_inserted(&mut self, table: &str, record: &Record, page: PageId) {
        for idx in self.for_table_mut(table) {
            if let Some(value) = record.get(&idx.field) {
                idx.insert(IndexKey::from_value(value), record.clone(), page);
            }
        }
    }

    /// Maintenance step after a heap delete.
    pub fn record_removed(&mut self, table: &str, record: &Record) {
        for idx in self.for_table_mut(table) {
            if let Some(value) = record.get(&idx.field) {
                idx.delete(&IndexKey::from_value(value), record);
            }
        }
    }

    /// Maintenance step after an update. Indexes on changed fields are moved
    /// (delete pre-image key, insert post-image key); indexes on unchanged
    /// fields keep their key and have the entry contents refreshed.
    pub fn record_updated(
        &mut self,
        table: &str,
        old: &Record,
        new: &Record,
        updates: &Record,
        page: PageId,
    ) {
        for idx in self.for_table_mut(table) {
            let field = idx.field.clone();
            if updates.contains(&field) {
                if let Some(value) = old.get(&field) {
                    idx.delete(&IndexKey::from_value(value), old);
                }
                if let Some(value) = new.get(&field) {
                    idx.insert(IndexKey::from_value(value), new.clone(), page);
                }
            } else if let Some(value) = old.get(&field) {
                idx.refresh(&IndexKey::from_value(value), old, new, page);
            }
        }
    }
}
