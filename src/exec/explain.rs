/// Query plans.
///
/// EXPLAIN shares the executor's access-path decisions (`pick_index`,
/// `is_hash_join`) so a reported plan always matches what execution would
/// actually do.
use std::fmt;

use crate::error::{Result, SawitError};
use crate::exec::command::{AggFunc, Command, JoinType, Projection, SortDir};
use crate::exec::{join, select, ExecCtx};
use crate::index::IndexStats;
use crate::schema::catalog;

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
    /// Indexes available on the driving table.
    pub indexes: Vec<IndexStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Scan {
        table: String,
        method: ScanMethod,
    },
    Join {
        table: String,
        join_type: JoinType,
        method: JoinMethod,
    },
    Sort {
        key: String,
        dir: SortDir,
    },
    Offset {
        count: usize,
    },
    Limit {
        count: usize,
    },
    Project {
        cols: Vec<String>,
    },
    Distinct,
    Group {
        key: String,
    },
    Aggregate {
        func: AggFunc,
        field: Option<String>,
    },
    Having,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMethod {
    IndexLookup,
    FullTableScan,
}

impl fmt::Display for ScanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMethod::IndexLookup => write!(f, "Index Lookup"),
            ScanMethod::FullTableScan => write!(f, "Full Table Scan"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMethod {
    HashJoin,
    NestedLoop,
}

impl fmt::Display for JoinMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinMethod::HashJoin => write!(f, "Hash Join"),
            JoinMethod::NestedLoop => write!(f, "Nested Loop"),
        }
    }
}

pub(crate) fn exec_explain(ctx: &mut ExecCtx, inner: &Command) -> Result<Plan> {
    match inner {
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
            catalog::find_table(ctx.pager, table)?
                .ok_or_else(|| SawitError::TableMissing(table.clone()))?;

            let mut steps = Vec::new();
            if joins.is_empty() {
                let method =
                    match select::pick_index(ctx.indexes, table, criteria.as_ref(), sort.as_ref())
                    {
                        Some(_) => ScanMethod::IndexLookup,
                        None => ScanMethod::FullTableScan,
                    };
                steps.push(PlanStep::Scan {
                    table: table.clone(),
                    method,
                });
            } else {
                steps.push(PlanStep::Scan {
                    table: table.clone(),
                    method: ScanMethod::FullTableScan,
                });
                for j in joins {
                    steps.push(PlanStep::Join {
                        table: j.table.clone(),
                        join_type: j.join_type,
                        method: if join::is_hash_join(j) {
                            JoinMethod::HashJoin
                        } else {
                            JoinMethod::NestedLoop
                        },
                    });
                }
            }

            if let Some(spec) = sort {
                steps.push(PlanStep::Sort {
                    key: spec.key.clone(),
                    dir: spec.dir,
                });
            }
            if let Some(n) = offset {
                steps.push(PlanStep::Offset { count: *n });
            }
            if let Some(n) = limit {
                steps.push(PlanStep::Limit { count: *n });
            }
            steps.push(PlanStep::Project {
                cols: match cols {
                    Projection::All => vec!["*".to_string()],
                    Projection::Cols(names) => names.clone(),
                },
            });
            if *distinct {
                steps.push(PlanStep::Distinct);
            }

            Ok(Plan {
                steps,
                indexes: table_indexes(ctx, table),
            })
        }
        Command::Aggregate {
            table,
            func,
            field,
            group_by,
            having,
            ..
        } => {
            catalog::find_table(ctx.pager, table)?
                .ok_or_else(|| SawitError::TableMissing(table.clone()))?;

            let mut steps = vec![PlanStep::Scan {
                table: table.clone(),
                method: ScanMethod::FullTableScan,
            }];
            if let Some(key) = group_by {
                steps.push(PlanStep::Group { key: key.clone() });
            }
            steps.push(PlanStep::Aggregate {
                func: *func,
                field: field.clone(),
            });
            if having.is_some() {
                steps.push(PlanStep::Having);
            }

            Ok(Plan {
                steps,
                indexes: table_indexes(ctx, table),
            })
        }
        _ => Err(SawitError::Execution(
            "EXPLAIN supports SELECT and AGGREGATE commands".into(),
        )),
    }
}

fn table_indexes(ctx: &ExecCtx, table: &str) -> Vec<IndexStats> {
    ctx.indexes.for_table(table).map(|i| i.stats()).collect()
}
