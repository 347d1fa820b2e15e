/// Predicate evaluation over records.
///
/// Equality and ordering coerce numerically when either operand is numeric
/// (strings parse, booleans map to 0/1, null to 0); otherwise values compare
/// within their own type. Missing fields behave like null.
use std::cell::RefCell;
use std::cmp::Ordering;
use std::num::NonZeroUsize;

use lru::LruCache;
use regex::{Regex, RegexBuilder};

use crate::exec::command::{CmpOp, Condition, Criteria, Logic, Operand};
use crate::types::{Record, Value};

pub fn matches(criteria: Option<&Criteria>, record: &Record) -> bool {
    match criteria {
        None => true,
        Some(c) => eval_criteria(c, record),
    }
}

pub fn eval_criteria(criteria: &Criteria, record: &Record) -> bool {
    match criteria {
        Criteria::Leaf(cond) => eval_condition(cond, record),
        Criteria::Compound { logic, conditions } => match logic {
            Logic::And => conditions.iter().all(|c| eval_criteria(c, record)),
            Logic::Or => conditions.iter().any(|c| eval_criteria(c, record)),
        },
    }
}

pub fn eval_condition(cond: &Condition, record: &Record) -> bool {
    let field = record.get(&cond.key).unwrap_or(&Value::Null);

    match cond.op {
        CmpOp::Eq => match &cond.val {
            Operand::Value(v) => loose_eq(field, v),
            _ => false,
        },
        CmpOp::Ne => match &cond.val {
            Operand::Value(v) => !loose_eq(field, v),
            _ => false,
        },
        CmpOp::Lt => ordered(field, &cond.val, |o| o == Ordering::Less),
        CmpOp::Gt => ordered(field, &cond.val, |o| o == Ordering::Greater),
        CmpOp::Le => ordered(field, &cond.val, |o| o != Ordering::Greater),
        CmpOp::Ge => ordered(field, &cond.val, |o| o != Ordering::Less),
        CmpOp::In => match &cond.val {
            Operand::List(list) => list.iter().any(|v| loose_eq(field, v)),
            _ => false,
        },
        CmpOp::NotIn => match &cond.val {
            Operand::List(list) => !list.iter().any(|v| loose_eq(field, v)),
            _ => false,
        },
        CmpOp::Like => match (&cond.val, field) {
            (Operand::Value(Value::Str(_)), Value::Null) => false,
            (Operand::Value(Value::Str(pattern)), v) => like_match(&v.to_string(), pattern),
            _ => false,
        },
        CmpOp::Between => match &cond.val {
            Operand::Range(lo, hi) => {
                ordered_value(field, lo, |o| o != Ordering::Less)
                    && ordered_value(field, hi, |o| o != Ordering::Greater)
            }
            _ => false,
        },
        CmpOp::IsNull => field.is_null(),
        CmpOp::IsNotNull => !field.is_null(),
    }
}

fn ordered(field: &Value, operand: &Operand, pred: impl Fn(Ordering) -> bool) -> bool {
    match operand {
        Operand::Value(v) => ordered_value(field, v, pred),
        _ => false,
    }
}

fn ordered_value(field: &Value, v: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    order_cmp(field, v).map(pred).unwrap_or(false)
}

/// Type-aware equality with numeric coercion.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ if a.is_number() || b.is_number() => match (a.coerce_number(), b.coerce_number()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => false,
    }
}

/// Ordering for range operators. Numeric when either side is numeric,
/// lexicographic for string pairs; incomparable pairs yield None.
pub fn order_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_number() || b.is_number() {
        match (a.coerce_number(), b.coerce_number()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        }
    } else {
        match (a, b) {
            (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
            (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
            _ => None,
        }
    }
}

/// Total order used by ORDER BY: null < numbers < strings < booleans.
pub fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
            Value::Bool(_) => 3,
        }
    }

    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (x, y) if rank(x) != rank(y) => rank(x).cmp(&rank(y)),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (x, y) if x.is_number() && y.is_number() => {
            let x = x.coerce_number().unwrap_or(0.0);
            let y = y.coerce_number().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        _ => Ordering::Equal,
    }
}

thread_local! {
    static LIKE_CACHE: RefCell<LruCache<String, Regex>> =
        RefCell::new(LruCache::new(NonZeroUsize::new(64).unwrap()));
}

/// SQL LIKE: `%` matches any run, `_` matches one character,
/// case-insensitive, everything else literal.
pub fn like_match(text: &str, pattern: &str) -> bool {
    LIKE_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(re) = cache.get(pattern) {
            return re.is_match(text);
        }
        match compile_like(pattern) {
            Some(re) => {
                let hit = re.is_match(text);
                cache.put(pattern.to_string(), re);
                hit
            }
            None => false,
        }
    })
}

fn compile_like(pattern: &str) -> Option<Regex> {
    let mut translated = String::with_capacity(pattern.len() + 8);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    RegexBuilder::new(&translated)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()
}
