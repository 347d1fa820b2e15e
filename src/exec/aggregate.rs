/// Aggregation: COUNT/SUM/AVG/MIN/MAX with optional GROUP BY and HAVING.
///
/// Field values pass through numeric coercion; a value that does not
/// coerce contributes 0 to SUM and AVG and is skipped by MIN/MAX. Empty
/// input yields null for MIN/MAX/AVG.
use std::collections::HashMap;

use crate::error::{Result, SawitError};
use crate::exec::command::{AggFunc, Condition, Criteria};
use crate::exec::eval;
use crate::exec::QueryOutput;
use crate::schema::catalog;
use crate::storage::heap::HeapFile;
use crate::storage::pager::Pager;
use crate::types::{Record, Value};

#[allow(clippy::too_many_arguments)]
pub(crate) fn exec_aggregate(
    pager: &mut Pager,
    table: &str,
    func: AggFunc,
    field: Option<&str>,
    criteria: Option<&Criteria>,
    group_by: Option<&str>,
    having: Option<&Condition>,
) -> Result<QueryOutput> {
    let entry = catalog::find_table(pager, table)?
        .ok_or_else(|| SawitError::TableMissing(table.to_string()))?;
    let rows = HeapFile::open(&entry).scan(pager, criteria, None)?;

    match group_by {
        None => {
            let mut result = Record::new();
            result.set(func.column().to_string(), compute(func, field, &rows));
            if let (Some(f), false) = (field, func == AggFunc::Count) {
                result.set("field".to_string(), Value::Str(f.to_string()));
            }
            Ok(QueryOutput::Row(result))
        }
        Some(group_key) => {
            // Buckets keyed by the stringified group value, in first-seen order.
            let mut order: Vec<(Value, Vec<Record>)> = Vec::new();
            let mut positions: HashMap<String, usize> = HashMap::new();
            for row in rows {
                let group_value = row.get(group_key).cloned().unwrap_or(Value::Null);
                let bucket = group_value.to_string();
                match positions.get(&bucket) {
                    Some(&i) => order[i].1.push(row),
                    None => {
                        positions.insert(bucket, order.len());
                        order.push((group_value, vec![row]));
                    }
                }
            }

            let mut out = Vec::new();
            for (group_value, bucket) in order {
                let mut result = Record::new();
                result.set(group_key.to_string(), group_value);
                result.set(func.column().to_string(), compute(func, field, &bucket));
                if let Some(cond) = having {
                    if !eval::eval_condition(cond, &result) {
                        continue;
                    }
                }
                out.push(result);
            }
            Ok(QueryOutput::Rows(out))
        }
    }
}

fn compute(func: AggFunc, field: Option<&str>, rows: &[Record]) -> Value {
    match func {
        AggFunc::Count => Value::Int(rows.len() as i64),
        AggFunc::Sum => normalize_number(sum(field, rows)),
        AggFunc::Avg => {
            if rows.is_empty() {
                Value::Null
            } else {
                Value::Float(sum(field, rows) / rows.len() as f64)
            }
        }
        AggFunc::Min => extremum(field, rows, |candidate, best| candidate < best),
        AggFunc::Max => extremum(field, rows, |candidate, best| candidate > best),
    }
}

fn sum(field: Option<&str>, rows: &[Record]) -> f64 {
    rows.iter()
        .map(|row| {
            field
                .and_then(|f| row.get(f))
                .and_then(|v| v.coerce_number())
                .unwrap_or(0.0)
        })
        .sum()
}

/// Winner by coerced numeric value; the original typed value is returned.
fn extremum(
    field: Option<&str>,
    rows: &[Record],
    better: impl Fn(f64, f64) -> bool,
) -> Value {
    let mut best: Option<(f64, Value)> = None;
    for row in rows {
        let Some(value) = field.and_then(|f| row.get(f)) else {
            continue;
        };
        let Some(n) = value.coerce_number() else {
            continue;
        };
        match &best {
            Some((current, _)) if !better(n, *current) => {}
            _ => best = Some((n, value.clone())),
        }
    }
    best.map(|(_, v)| v).unwrap_or(Value::Null)
}

/// Whole-valued sums come back as integers, mirroring how the parser types
/// literals.
fn normalize_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (1i64 << 53) as f64 {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}
