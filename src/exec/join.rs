/// Join evaluation: a left-fold over the join list producing one relation.
///
/// Scanned rows carry every column twice, under its bare name and under
/// `table.column`, so WHERE and ON clauses can use either form. Equi-joins
/// build a hash map on one side and probe from the other; any other ON
/// operator falls back to a nested loop.
use std::collections::HashMap;

use crate::error::{Result, SawitError};
use crate::exec::command::{CmpOp, JoinSpec, JoinType, OnClause};
use crate::exec::eval;
use crate::schema::catalog::{self, TableEntry};
use crate::storage::heap::HeapFile;
use crate::storage::pager::Pager;
use crate::types::{Record, Value};

/// Scan a table with each column aliased under both names.
fn scan_aliased(pager: &mut Pager, entry: &TableEntry) -> Result<Vec<Record>> {
    let heap = HeapFile::open(entry);
    let rows = heap.scan(pager, None, None)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let mut aliased = Record::new();
            for (k, v) in row.iter() {
                aliased.set(k.to_string(), v.clone());
            }
            for (k, v) in row.iter() {
                aliased.set(format!("{}.{}", entry.name, k), v.clone());
            }
            aliased
        })
        .collect())
}

/// Later fields overwrite bare-name collisions, like an object spread.
fn combine(left: &Record, right: &Record) -> Record {
    let mut out = left.clone();
    for (k, v) in right.iter() {
        out.set(k.to_string(), v.clone());
    }
    out
}

/// First-seen union of the column names across a relation, used to build
/// null padding for outer joins.
fn union_keys(rows: &[Record]) -> Vec<String> {
    let mut keys = Vec::new();
    for row in rows {
        for k in row.keys() {
            if !keys.iter().any(|existing| existing == k) {
                keys.push(k.to_string());
            }
        }
    }
    keys
}

fn null_record(keys: &[String]) -> Record {
    let mut rec = Record::new();
    for k in keys {
        rec.set(k.clone(), Value::Null);
    }
    rec
}

/// Hash-map bucket key for a join value. Numbers coerce so 5 and 5.0 land
/// in the same bucket.
fn bucket_key(value: &Value) -> String {
    match value {
        Value::Null => "z".to_string(),
        Value::Bool(b) => format!("b:{}", b),
        Value::Int(_) | Value::Float(_) => {
            format!("n:{}", value.coerce_number().unwrap_or(f64::NAN))
        }
        Value::Str(s) => format!("s:{}", s),
    }
}

fn on_matches(on: &OnClause, left: &Record, right: &Record) -> bool {
    let l = left.get(&on.left).unwrap_or(&Value::Null);
    let r = right.get(&on.right).unwrap_or(&Value::Null);
    match on.op {
        CmpOp::Eq => eval::loose_eq(l, r),
        CmpOp::Ne => !eval::loose_eq(l, r),
        CmpOp::Lt => matches!(eval::order_cmp(l, r), Some(std::cmp::Ordering::Less)),
        CmpOp::Gt => matches!(eval::order_cmp(l, r), Some(std::cmp::Ordering::Greater)),
        CmpOp::Le => !matches!(eval::order_cmp(l, r), Some(std::cmp::Ordering::Greater) | None),
        CmpOp::Ge => !matches!(eval::order_cmp(l, r), Some(std::cmp::Ordering::Less) | None),
        _ => false,
    }
}

/// Whether this join runs as a hash join (used by EXPLAIN too).
pub fn is_hash_join(join: &JoinSpec) -> bool {
    join.join_type != JoinType::Cross
        && matches!(&join.on, Some(on) if on.op == CmpOp::Eq)
}

/// Run the full join list over the driving table.
pub fn run_joins(
    pager: &mut Pager,
    base_entry: &TableEntry,
    joins: &[JoinSpec],
) -> Result<Vec<Record>> {
    let mut rows = scan_aliased(pager, base_entry)?;

    for join in joins {
        let right_entry = catalog::find_table(pager, &join.table)?
            .ok_or_else(|| SawitError::TableMissing(join.table.clone()))?;
        let right_rows = scan_aliased(pager, &right_entry)?;
        rows = join_step(&rows, &right_rows, join);
    }
    Ok(rows)
}

fn join_step(left_rows: &[Record], right_rows: &[Record], join: &JoinSpec) -> Vec<Record> {
    match join.join_type {
        JoinType::Cross => {
            let mut out = Vec::with_capacity(left_rows.len() * right_rows.len());
            for left in left_rows {
                for right in right_rows {
                    out.push(combine(left, right));
                }
            }
            out
        }
        JoinType::Inner | JoinType::Left | JoinType::Full => {
            join_probe_right(left_rows, right_rows, join)
        }
        JoinType::Right => join_probe_left(left_rows, right_rows, join),
    }
}

/// INNER/LEFT/FULL: drive from the left, probing the right side.
fn join_probe_right(left_rows: &[Record], right_rows: &[Record], join: &JoinSpec) -> Vec<Record> {
    let pad_left = matches!(join.join_type, JoinType::Left | JoinType::Full);
    let right_keys = union_keys(right_rows);
    let mut right_matched = vec![false; right_rows.len()];
    let mut out = Vec::new();

    if is_hash_join(join) {
        let on = join.on.as_ref().unwrap();
        let mut table: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, right) in right_rows.iter().enumerate() {
            let key = bucket_key(right.get(&on.right).unwrap_or(&Value::Null));
            table.entry(key).or_default().push(i);
        }

        for left in left_rows {
            let key = bucket_key(left.get(&on.left).unwrap_or(&Value::Null));
            let mut matched = false;
            if let Some(candidates) = table.get(&key) {
                for &i in candidates {
                    out.push(combine(left, &right_rows[i]));
                    right_matched[i] = true;
                    matched = true;
                }
            }
            if !matched && pad_left {
                out.push(combine(left, &null_record(&right_keys)));
            }
        }
    } else {
        for left in left_rows {
            let mut matched = false;
            for (i, right) in right_rows.iter().enumerate() {
                let hit = match &join.on {
                    Some(on) => on_matches(on, left, right),
                    None => true,
                };
                if hit {
                    out.push(combine(left, right));
                    right_matched[i] = true;
                    matched = true;
                }
            }
            if !matched && pad_left {
                out.push(combine(left, &null_record(&right_keys)));
            }
        }
    }

    if join.join_type == JoinType::Full {
        let left_keys = union_keys(left_rows);
        let null_left = null_record(&left_keys);
        for (i, right) in right_rows.iter().enumerate() {
            if !right_matched[i] {
                out.push(combine(&null_left, right));
            }
        }
    }
    out
}

/// RIGHT: symmetric form, hashing the left side and driving from the right.
fn join_probe_left(left_rows: &[Record], right_rows: &[Record], join: &JoinSpec) -> Vec<Record> {
    let left_keys = union_keys(left_rows);
    let null_left = null_record(&left_keys);
    let mut out = Vec::new();

    if is_hash_join(join) {
        let on = join.on.as_ref().unwrap();
        let mut table: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, left) in left_rows.iter().enumerate() {
            let key = bucket_key(left.get(&on.left).unwrap_or(&Value::Null));
            table.entry(key).or_default().push(i);
        }

        for right in right_rows {
            let key = bucket_key(right.get(&on.right).unwrap_or(&Value::Null));
            match table.get(&key) {
                Some(candidates) if !candidates.is_empty() => {
                    for &i in candidates {
                        out.push(combine(&left_rows[i], right));
                    }
                }
                _ => out.push(combine(&null_left, right)),
            }
        }
    } else {
        for right in right_rows {
            let mut matched = false;
            for left in left_rows {
                let hit = match &join.on {
                    Some(on) => on_matches(on, left, right),
                    None => true,
                };
                if hit {
                    out.push(combine(left, right));
                    matched = true;
                }
            }
            if !matched {
                out.push(combine(&null_left, right));
            }
        }
    }
    out
}
