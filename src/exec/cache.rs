/// LRU cache of parsed command templates, keyed by the raw query string.
///
/// A hit hands back a clone so parameter binding can never mutate the
/// cached template. Bound commands are not inserted; the parser layer
/// caches the template once and binds after retrieval.
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::error::{Result, SawitError};
use crate::exec::command::{Command, Condition, Criteria, Operand};
use crate::types::Value;

pub const DEFAULT_CAPACITY: usize = 1000;

pub struct QueryCache {
    cache: LruCache<String, Command>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        QueryCache {
            cache: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
        }
    }

    pub fn get(&mut self, raw: &str) -> Option<Command> {
        self.cache.get(raw).cloned()
    }

    pub fn put(&mut self, raw: &str, command: Command) {
        self.cache.put(raw.to_string(), command);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Substitute positional placeholders with literal values.
pub fn bind_params(command: &mut Command, params: &[Value]) -> Result<()> {
    match command {
        Command::Select { criteria, .. }
        | Command::Delete { criteria, .. }
        | Command::Update { criteria, .. } => {
            if let Some(c) = criteria {
                bind_criteria(c, params)?;
            }
        }
        Command::Aggregate {
            criteria, having, ..
        } => {
            if let Some(c) = criteria {
                bind_criteria(c, params)?;
            }
            if let Some(cond) = having {
                bind_condition(cond, params)?;
            }
        }
        Command::Explain(inner) => bind_params(inner, params)?,
        _ => {}
    }
    Ok(())
}

fn bind_criteria(criteria: &mut Criteria, params: &[Value]) -> Result<()> {
    match criteria {
        Criteria::Leaf(cond) => bind_condition(cond, params),
        Criteria::Compound { conditions, .. } => {
            for c in conditions {
                bind_criteria(c, params)?;
            }
            Ok(())
        }
    }
}

fn bind_condition(cond: &mut Condition, params: &[Value]) -> Result<()> {
    if let Operand::Param(n) = &cond.val {
        let value = params.get(*n).cloned().ok_or_else(|| {
            SawitError::Execution(format!("missing value for parameter ${}", n))
        })?;
        cond.val = Operand::Value(value);
    }
    Ok(())
}

/// A command still carrying unbound placeholders cannot execute.
pub(crate) fn check_fully_bound(command: &Command) -> Result<()> {
    fn check_criteria(criteria: &Criteria) -> Result<()> {
        match criteria {
            Criteria::Leaf(cond) => check_condition(cond),
            Criteria::Compound { conditions, .. } => {
                conditions.iter().try_for_each(check_criteria)
            }
        }
    }
    fn check_condition(cond: &Condition) -> Result<()> {
        match &cond.val {
            Operand::Param(n) => Err(SawitError::Execution(format!(
                "unbound parameter ${}",
                n
            ))),
            _ => Ok(()),
        }
    }

    match command {
        Command::Select { criteria, .. }
        | Command::Delete { criteria, .. }
        | Command::Update { criteria, .. } => {
            criteria.as_ref().map(check_criteria).transpose()?;
        }
        Command::Aggregate {
            criteria, having, ..
        } => {
            criteria.as_ref().map(check_criteria).transpose()?;
            having.as_ref().map(check_condition).transpose()?;
        }
        Command::Explain(inner) => check_fully_bound(inner)?,
        _ => {}
    }
    Ok(())
}
