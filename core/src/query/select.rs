use common::err::{CResult, ReError};
use common::value::Value;

use crate::bindable::Bindable;
use crate::query::{execute_builder, require_non_empty, BindSlots, SqlRenderable, WhereClause};
use crate::resultset::Resultset;
use crate::session::Session;

/// `INNER`/`LEFT`/`RIGHT`/`FULL` — the join kinds spec.md §4.6 names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

/// One `JOIN table ON clause` fragment.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    kind: JoinKind,
    table: String,
    on: String,
}

impl JoinSpec {
    pub fn new(kind: JoinKind, table: impl Into<String>, on: impl Into<String>) -> Self {
        JoinSpec { kind, table: table.into(), on: on.into() }
    }

    fn render(&self) -> String {
        format!("{} {} ON {}", self.kind.keyword(), self.table, self.on)
    }
}

/// `SELECT ... FROM ... [JOIN ...]* WHERE ... GROUP BY ... ORDER BY ...
/// LIMIT/OFFSET` builder (C6).
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    columns: Vec<String>,
    table: String,
    joins: Vec<JoinSpec>,
    where_: WhereClause,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    slots: BindSlots,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        SelectQuery { table: table.into(), ..Default::default() }
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn join(mut self, spec: JoinSpec) -> Self {
        self.joins.push(spec);
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

    pub fn group_by(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(column.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.table.is_empty() && (self.where_.is_empty() || self.where_.is_valid())
    }

    pub fn bindings(&self) -> Vec<Value> {
        self.slots.values()
    }

    /// Renders, prepares against `session`, binds the accumulated values,
    /// and runs — spec.md §4.6's builder `execute()`.
    pub fn execute(&self, session: &mut dyn Session) -> CResult<Box<dyn Resultset>> {
        execute_builder(session, &self.to_sql()?, self.bindings())
    }
}

impl SqlRenderable for SelectQuery {
    fn to_sql(&self) -> CResult<String> {
        require_non_empty("table", &self.table)?;
        if !self.where_.is_empty() && !self.where_.is_valid() {
            return Err(ReError::InvalidQuery("unbalanced parentheses in WHERE clause".into()));
        }

        let columns = if self.columns.is_empty() { "*".to_string() } else { self.columns.join(", ") };
        let mut sql = format!("SELECT {columns} FROM {}", self.table);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.render());
        }
        if !self.where_.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(self.where_.sql());
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(sql)
    }
}

impl Bindable for SelectQuery {
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
    fn renders_full_select() {
        let q = SelectQuery::new("users")
            .columns(["id", "name"])
            .where_clause("age > ?", vec![Value::Integer(18)])
            .unwrap()
            .order_by("name")
            .limit(10)
            .offset(5);

        assert_eq!(
            q.to_sql().unwrap(),
            "SELECT id, name FROM users WHERE age > ? ORDER BY name LIMIT 10 OFFSET 5"
        );
        assert_eq!(q.bindings(), vec![Value::Integer(18)]);
    }

    #[test]
    fn missing_table_is_invalid_query() {
        let q = SelectQuery::new("");
        assert!(matches!(q.to_sql(), Err(ReError::InvalidQuery(_))));
    }

    #[test]
    fn unbalanced_where_is_rejected() {
        let q = SelectQuery::new("users").where_clause("(a = 1", vec![]).unwrap();
        assert!(!q.is_valid());
        assert!(q.to_sql().is_err());
    }

    #[test]
    fn join_and_group_by_render_in_order() {
        let q = SelectQuery::new("orders")
            .columns(["orders.id", "customers.name"])
            .join(JoinSpec::new(JoinKind::Left, "customers", "orders.customer_id = customers.id"))
            .group_by(["customers.name"]);

        assert_eq!(
            q.to_sql().unwrap(),
            "SELECT orders.id, customers.name FROM orders LEFT JOIN customers ON orders.customer_id = customers.id GROUP BY customers.name"
        );
    }

    #[test]
    fn multiple_joins_render_in_append_order() {
        let q = SelectQuery::new("a")
            .join(JoinSpec::new(JoinKind::Inner, "b", "a.id = b.a_id"))
            .join(JoinSpec::new(JoinKind::Right, "c", "b.id = c.b_id"));

        assert_eq!(
            q.to_sql().unwrap(),
            "SELECT * FROM a INNER JOIN b ON a.id = b.a_id RIGHT JOIN c ON b.id = c.b_id"
        );
    }
}
