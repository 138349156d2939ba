pub mod delete;
pub mod insert;
pub mod select;
pub mod update;
pub mod where_clause;

pub use delete::DeleteQuery;
pub use insert::InsertQuery;
pub use select::{JoinKind, JoinSpec, SelectQuery};
pub use update::UpdateQuery;
pub use where_clause::WhereClause;

use std::collections::HashMap;

use common::err::{CResult, ReError};
use common::value::Value;

use crate::bindable::Bindable;
use crate::resultset::Resultset;
use crate::session::Session;

/// Renders a query builder to its final SQL text. Separate from
/// `Bindable` because rendering can fail (missing table, empty WHERE on a
/// DELETE/UPDATE) while binding never does once a slot exists.
pub trait SqlRenderable {
    fn to_sql(&self) -> CResult<String>;
}

/// Shared positional + named binding storage backing every query builder —
/// the Rust replacement for the original's `bindable`-by-inheritance
/// design (spec.md §9 REDESIGN FLAGS): composition over a class hierarchy.
#[derive(Debug, Clone, Default)]
pub struct BindSlots {
    slots: Vec<Option<Value>>,
    named: HashMap<String, Value>,
}

impl BindSlots {
    pub fn new() -> Self {
        BindSlots::default()
    }

    pub fn values(&self) -> Vec<Value> {
        self.slots.iter().map(|v| v.clone().unwrap_or(Value::Null)).collect()
    }

    /// Count of positional slots bound so far (0-based count, not a slot
    /// index) — used where a builder needs "how many values" rather than
    /// "the next 1-based slot to bind", e.g. matching `INSERT`'s column
    /// count against its bound value count.
    pub fn count(&self) -> usize {
        self.slots.len()
    }
}

impl Bindable for BindSlots {
    /// 1-based per spec.md §4.3 (translated to the 0-based backing vector).
    fn bind_value(&mut self, index: usize, value: Value) -> CResult<()> {
        if index == 0 {
            return Err(ReError::BindingError("positional parameter index is 1-based; got 0".into()));
        }
        let zero_based = index - 1;
        if self.slots.len() <= zero_based {
            self.slots.resize(zero_based + 1, None);
        }
        self.slots[zero_based] = Some(value);
        Ok(())
    }

    fn bind_named(&mut self, name: &str, value: Value) -> CResult<()> {
        self.named.insert(name.to_string(), value);
        Ok(())
    }

    fn next_free_slot(&self) -> usize {
        self.slots.len() + 1
    }

    fn bound_value(&self, index: usize) -> Option<&Value> {
        if index == 0 {
            return None;
        }
        self.slots.get(index - 1).and_then(|v| v.as_ref())
    }

    fn clear_bindings(&mut self) {
        self.slots.clear();
        self.named.clear();
    }
}

pub(crate) fn require_non_empty(name: &str, value: &str) -> CResult<()> {
    if value.is_empty() {
        Err(ReError::InvalidQuery(format!("{name} must not be empty")))
    } else {
        Ok(())
    }
}

/// Shared plumbing behind every builder's `execute()`: render the SQL,
/// create a Statement against `session`, bind the builder's accumulated
/// values in positional order, and run it. Exists once here rather than
/// once per builder since rendering is the only thing that differs
/// (spec.md §4.6: "Builders expose `to_string()` ... and `execute()` which
/// prepares, binds, and runs").
pub(crate) fn execute_builder(
    session: &mut dyn Session,
    sql: &str,
    bindings: Vec<Value>,
) -> CResult<Box<dyn Resultset>> {
    let mut statement = session.create_statement(sql)?;
    for (index, value) in bindings.into_iter().enumerate() {
        statement.bind_value(index + 1, value)?;
    }
    statement.execute()
}
