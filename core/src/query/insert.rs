use common::err::{CResult, ReError};
use common::value::Value;

use crate::bindable::Bindable;
use crate::query::{execute_builder, require_non_empty, BindSlots, SqlRenderable};
use crate::resultset::Resultset;
use crate::session::Session;

/// `INSERT INTO table (cols...) VALUES (?, ?, ...)` builder (C6).
#[derive(Debug, Clone, Default)]
pub struct InsertQuery {
    table: String,
    columns: Vec<String>,
    slots: BindSlots,
}

impl InsertQuery {
    pub fn new(table: impl Into<String>) -> Self {
        InsertQuery { table: table.into(), ..Default::default() }
    }

    /// Appends one column/value pair, binding the value at the next free
    /// positional slot.
    pub fn value(mut self, column: impl Into<String>, value: Value) -> CResult<Self> {
        self.columns.push(column.into());
        let index = self.slots.next_free_slot();
        self.slots.bind_value(index, value)?;
        Ok(self)
    }

    pub fn is_valid(&self) -> bool {
        !self.table.is_empty() && !self.columns.is_empty() && self.columns.len() == self.slots.count()
    }

    pub fn bindings(&self) -> Vec<Value> {
        self.slots.values()
    }

    /// Renders, prepares against `session`, binds, and runs. Call
    /// `session.last_insert_id()` afterward per spec.md §4.6.
    pub fn execute(&self, session: &mut dyn Session) -> CResult<Box<dyn Resultset>> {
        execute_builder(session, &self.to_sql()?, self.bindings())
    }
}

impl SqlRenderable for InsertQuery {
    fn to_sql(&self) -> CResult<String> {
        require_non_empty("table", &self.table)?;
        if self.columns.is_empty() {
            return Err(ReError::InvalidQuery("insert requires at least one column".into()));
        }
        if self.columns.len() != self.slots.count() {
            return Err(ReError::InvalidQuery(
                "column count does not match bound value count".into(),
            ));
        }

        let placeholders = vec!["?"; self.columns.len()].join(", ");
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(", "),
            placeholders
        ))
    }
}

impl Bindable for InsertQuery {
    fn bind_value(&mut self, index: usize, value: Value) -> CResult<()> {
        self.slots.bind_value(index, value)
    }
    fn bind_named(&mut self, name: &str, value: Value) -> CResult<()> {
        self.slots.bind_named(name, value)
    }
    fn next_free_slot(&self) -> usize {
        self.slots.next_free_slot()
    }
    fn bound_value(&self, index: usize) -> Option<&Value> {
        self.slots.bound_value(index)
    }
    fn clear_bindings(&mut self) {
        self.slots.clear_bindings()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn renders_insert_with_matching_columns_and_values() {
        let q = InsertQuery::new("users")
            .value("name", Value::Text("Bryan".into()))
            .unwrap()
            .value("age", Value::Integer(30))
            .unwrap();

        assert_eq!(q.to_sql().unwrap(), "INSERT INTO users (name, age) VALUES (?, ?)");
        assert_eq!(q.bindings(), vec![Value::Text("Bryan".into()), Value::Integer(30)]);
    }

    #[test]
    fn empty_insert_is_invalid() {
        let q = InsertQuery::new("users");
        assert!(matches!(q.to_sql(), Err(ReError::InvalidQuery(_))));
    }
}
