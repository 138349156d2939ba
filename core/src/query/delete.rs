use common::err::{CResult, ReError};
use common::value::Value;

use crate::bindable::Bindable;
use crate::query::{execute_builder, require_non_empty, BindSlots, SqlRenderable, WhereClause};
use crate::resultset::Resultset;
use crate::session::Session;

/// `DELETE FROM table WHERE ...` builder, grounded in
/// `original_source/src/delete_query.h` (C6).
#[derive(Debug, Clone, Default)]
pub struct DeleteQuery {
    table: String,
    where_: WhereClause,
    slots: BindSlots,
}

impl DeleteQuery {
    pub fn new(table: impl Into<String>) -> Self {
        DeleteQuery { table: table.into(), ..Default::default() }
    }

    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn where_clause(mut self, value: impl Into<WhereClause>, args: impl IntoIterator<Item = Value>) -> CResult<Self> {
        self.where_ = value.into();
        let mut last = self.slots.next_free_slot();
        for v in args {
            self.slots.bind_value(last, v)?;
            last += 1;
        }
        Ok(self)
    }

    /// the original requires a non-empty WHERE on delete_query::is_valid()
    /// to guard against accidental full-table deletes.
    pub fn is_valid(&self) -> bool {
        !self.table.is_empty() && !self.where_.is_empty() && self.where_.is_valid()
    }

    pub fn bindings(&self) -> Vec<Value> {
        self.slots.values()
    }

    pub fn execute(&self, session: &mut dyn Session) -> CResult<Box<dyn Resultset>> {
        execute_builder(session, &self.to_sql()?, self.bindings())
    }
}

impl SqlRenderable for DeleteQuery {
    fn to_sql(&self) -> CResult<String> {
        require_non_empty("table", &self.table)?;
        if self.where_.is_empty() {
            return Err(ReError::InvalidQuery("delete requires a WHERE clause".into()));
        }
        if !self.where_.is_valid() {
            return Err(ReError::InvalidQuery("unbalanced parentheses in WHERE clause".into()));
        }

        Ok(format!("DELETE FROM {} WHERE {}", self.table, self.where_.sql()))
    }
}

impl Bindable for DeleteQuery {
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
    fn renders_delete_with_where() {
        let q = DeleteQuery::new("users").where_clause("id = ?", vec![Value::Integer(1)]).unwrap();
        assert_eq!(q.to_sql().unwrap(), "DELETE FROM users WHERE id = ?");
    }

    #[test]
    fn delete_without_where_is_invalid() {
        let q = DeleteQuery::new("users");
        assert!(!q.is_valid());
        assert!(matches!(q.to_sql(), Err(ReError::InvalidQuery(_))));
    }
}
