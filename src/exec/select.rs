/// SELECT pipeline: access path, joins, WHERE, sort, offset/limit,
/// projection, DISTINCT.
use std::collections::HashSet;

use crate::error::{Result, SawitError};
use crate::exec::command::{
    CmpOp, Criteria, JoinSpec, Operand, Projection, SortDir, SortSpec,
};
use crate::exec::{eval, join};
use crate::index::{Index, IndexKey, IndexRegistry};
use crate::schema::catalog;
use crate::storage::heap::HeapFile;
use crate::storage::pager::Pager;
use crate::types::{Record, Value};

/// The executor probes an index iff the criteria is a bare equality on an
/// indexed field and no sort is requested. EXPLAIN reports through the same
/// decision so plans never diverge from execution.
pub(crate) fn pick_index<'a>(
    indexes: &'a IndexRegistry,
    table: &str,
    criteria: Option<&Criteria>,
    sort: Option<&SortSpec>,
) -> Option<(&'a Index, IndexKey)> {
    if sort.is_some() {
        return None;
    }
    let cond = criteria?.as_single()?;
    if cond.op != CmpOp::Eq {
        return None;
    }
    let Operand::Value(value) = &cond.val else {
        return None;
    };
    let index = indexes.find(table, &cond.key)?;
    Some((index, IndexKey::from_value(value)))
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn exec_select(
    pager: &mut Pager,
    indexes: &IndexRegistry,
    table: &str,
    cols: &Projection,
    criteria: Option<&Criteria>,
    sort: Option<&SortSpec>,
    limit: Option<usize>,
    offset: Option<usize>,
    joins: &[JoinSpec],
    distinct: bool,
) -> Result<Vec<Record>> {
    let entry = catalog::find_table(pager, table)?
        .ok_or_else(|| SawitError::TableMissing(table.to_string()))?;

    let mut rows = if !joins.is_empty() {
        // Joins fold over a full scan; WHERE runs on the joined rows.
        let mut joined = join::run_joins(pager, &entry, joins)?;
        joined.retain(|row| eval::matches(criteria, row));
        joined
    } else if let Some((index, key)) = pick_index(indexes, table, criteria, sort) {
        index.search(&key)
    } else {
        // Limit is only pushed into the scan when no sort reorders rows;
        // the offset still has to be consumed after.
        let scan_limit = match sort {
            None => limit.map(|l| l + offset.unwrap_or(0)),
            Some(_) => None,
        };
        HeapFile::open(&entry).scan(pager, criteria, scan_limit)?
    };

    if let Some(spec) = sort {
        sort_rows(&mut rows, spec);
    }

    if let Some(skip) = offset {
        if skip >= rows.len() {
            rows.clear();
        } else {
            rows.drain(..skip);
        }
    }
    if let Some(n) = limit {
        rows.truncate(n);
    }

    let mut rows = project(rows, cols);

    if distinct {
        let mut seen = HashSet::new();
        rows.retain(|row| seen.insert(row.canonical_key()));
    }

    Ok(rows)
}

/// Stable sort on one key.
pub(crate) fn sort_rows(rows: &mut [Record], spec: &SortSpec) {
    rows.sort_by(|a, b| {
        let ord = eval::sort_cmp(a.get(&spec.key), b.get(&spec.key));
        match spec.dir {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    });
}

/// `*` keeps the full (possibly joined) row; explicit columns fill missing
/// fields with null.
fn project(rows: Vec<Record>, cols: &Projection) -> Vec<Record> {
    match cols {
        Projection::All => rows,
        Projection::Cols(names) => rows
            .into_iter()
            .map(|row| {
                let mut out = Record::new();
                for name in names {
                    let value = row.get(name).cloned().unwrap_or(Value::Null);
                    out.set(name.clone(), value);
                }
                out
            })
            .collect(),
    }
}
