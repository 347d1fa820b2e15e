/// Typed command surface consumed from the parser.
///
/// The tokenizer/parser live outside this crate; they hand the executor a
/// `Command` plus the raw query text (used for event hooks and the query
/// cache key).
use crate::types::{Record, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateTable {
        table: String,
    },
    ShowTables,
    ShowIndexes {
        table: Option<String>,
    },
    Insert {
        table: String,
        data: Vec<Record>,
    },
    Select {
        table: String,
        cols: Projection,
        criteria: Option<Criteria>,
        sort: Option<SortSpec>,
        limit: Option<usize>,
        offset: Option<usize>,
        joins: Vec<JoinSpec>,
        distinct: bool,
    },
    Delete {
        table: String,
        criteria: Option<Criteria>,
    },
    Update {
        table: String,
        updates: Record,
        criteria: Option<Criteria>,
    },
    DropTable {
        table: String,
    },
    CreateIndex {
        table: String,
        field: String,
    },
    Aggregate {
        table: String,
        func: AggFunc,
        field: Option<String>,
        criteria: Option<Criteria>,
        group_by: Option<String>,
        having: Option<Condition>,
    },
    Explain(Box<Command>),
    /// Parser-reported failure, surfaced verbatim by the executor.
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    All,
    Cols(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    Leaf(Condition),
    Compound {
        logic: Logic,
        conditions: Vec<Criteria>,
    },
}

impl Criteria {
    pub fn leaf(key: &str, op: CmpOp, val: Operand) -> Criteria {
        Criteria::Leaf(Condition {
            key: key.to_string(),
            op,
            val,
        })
    }

    pub fn eq(key: &str, value: Value) -> Criteria {
        Criteria::leaf(key, CmpOp::Eq, Operand::Value(value))
    }

    pub fn and(conditions: Vec<Criteria>) -> Criteria {
        Criteria::Compound {
            logic: Logic::And,
            conditions,
        }
    }

    pub fn or(conditions: Vec<Criteria>) -> Criteria {
        Criteria::Compound {
            logic: Logic::Or,
            conditions,
        }
    }

    /// The single comparison held by a non-compound criteria, if any.
    pub fn as_single(&self) -> Option<&Condition> {
        match self {
            Criteria::Leaf(cond) => Some(cond),
            Criteria::Compound { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub key: String,
    pub op: CmpOp,
    pub val: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    In,
    NotIn,
    Like,
    Between,
    IsNull,
    IsNotNull,
}

/// Right-hand side of a comparison. `Param` is a positional placeholder
/// bound after query-cache retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    List(Vec<Value>),
    Range(Value, Value),
    Param(usize),
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Cross => "CROSS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub table: String,
    pub join_type: JoinType,
    /// Absent for CROSS joins.
    pub on: Option<OnClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OnClause {
    pub left: String,
    pub op: CmpOp,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub key: String,
    pub dir: SortDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    /// Result column name: `count`, `sum`, `avg`, `min`, `max`.
    pub fn column(&self) -> &'static str {
        match self {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        }
    }
}
