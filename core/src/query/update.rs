use common::err::{CResult, ReError};
use common::value::Value;

use crate::bindable::Bindable;
use crate::query::{execute_builder, require_non_empty, BindSlots, SqlRenderable, WhereClause};
use crate::resultset::Resultset;
use crate::session::Session;

/// `UPDATE table SET col = ?, ... WHERE ...` builder (C6).
#[derive(Debug, Clone, Default)]
pub struct UpdateQuery {
    table: String,
    assignments: Vec<String>,
    where_: WhereClause,
    slots: BindSlots,
}

impl UpdateQuery {
    pub fn new(table: impl Into<String>) -> Self {
        UpdateQuery { table: table.into(), ..Default::default() }
    }

    pub fn set(mut self, column: impl Into<String>, value: Value) -> CResult<Self> {
        self.assignments.push(format!("{} = ?", column.into()));
        let index = self.slots.next_free_slot();
        self.slots.bind_value(index, value)?;
        Ok(self)
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

    pub fn is_valid(&self) -> bool {
        !self.table.is_empty()
            && !self.assignments.is_empty()
            && (self.where_.is_empty() || self.where_.is_valid())
    }

    pub fn bindings(&self) -> Vec<Value> {
        self.slots.values()
    }

    pub fn execute(&self, session: &mut dyn Session) -> CResult<Box<dyn Resultset>> {
        execute_builder(session, &self.to_sql()?, self.bindings())
    }
}

impl SqlRenderable for UpdateQuery {
    fn to_sql(&self) -> CResult<String> {
        require_non_empty("table", &self.table)?;
        if self.assignments.is_empty() {
            return Err(ReError::InvalidQuery("update requires at least one assignment".into()));
        }
        if !self.where_.is_empty() && !self.where_.is_valid() {
            return Err(ReError::InvalidQuery("unbalanced parentheses in WHERE clause".into()));
        }

        let mut sql = format!("UPDATE {} SET {}", self.table, self.assignments.join(", "));
        if !self.where_.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(self.where_.sql());
        }
        Ok(sql)
    }
}

impl Bindable for UpdateQuery {
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
    fn renders_update_with_where_clause() {
        let q = UpdateQuery::new("users")
            .set("name", Value::Text("Bryan".into()))
            .unwrap()
            .where_clause("id = ?", vec![Value::Integer(1)])
            .unwrap();

        assert_eq!(q.to_sql().unwrap(), "UPDATE users SET name = ? WHERE id = ?");
        assert_eq!(q.bindings(), vec![Value::Text("Bryan".into()), Value::Integer(1)]);
    }

    #[test]
    fn update_without_assignments_is_invalid() {
        let q = UpdateQuery::new("users");
        assert!(matches!(q.to_sql(), Err(ReError::InvalidQuery(_))));
    }
}
