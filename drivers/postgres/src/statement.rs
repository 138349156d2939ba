use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use common::column::ColumnDefinition;
use common::err::{CResult, ReError};
use common::row::Row;
use common::value::Value;
use core_db::bindable::Bindable;
use core_db::paramstyle::{self, ParamStyle, RewrittenSql};
use core_db::query::BindSlots;
use core_db::resultset::{Resultset, ResultsetState, RowCursor};
use core_db::session::InFlightGuard;
use core_db::statement::{Statement, StatementState};
use postgres::types::ToSql;

use crate::convert::{category_of, value_at, PgValue};

/// A Statement bound to a shared PostgreSQL client. `$1`, `$2`, ... is
/// Postgres's only placeholder (spec.md §6); `?` and `:name`/`@name` forms
/// are rewritten to `$N` at construction time via `paramstyle::rewrite`
/// before the SQL is ever handed to the server. The `postgres` crate's own
/// prepared `Statement` handle is cached once `prepare()` succeeds.
pub struct PostgresStatement {
    client: Rc<RefCell<postgres::Client>>,
    template: String,
    prepared_sql: String,
    rewritten: RewrittenSql,
    state: StatementState,
    slots: BindSlots,
    handle: Option<postgres::Statement>,
    _guard: InFlightGuard,
}

impl PostgresStatement {
    pub(crate) fn new(
        client: Rc<RefCell<postgres::Client>>,
        sql: impl Into<String>,
        guard: InFlightGuard,
    ) -> CResult<Self> {
        let template = sql.into();
        let rewritten = paramstyle::rewrite(&template, ParamStyle::DollarNumber, true)?;
        let prepared_sql = rewritten.sql.clone();
        Ok(PostgresStatement {
            client,
            template,
            prepared_sql,
            rewritten,
            state: StatementState::Fresh,
            slots: BindSlots::new(),
            handle: None,
            _guard: guard,
        })
    }
}

impl Bindable for PostgresStatement {
    fn bind_value(&mut self, index: usize, value: Value) -> CResult<()> {
        self.slots.bind_value(index, value)
    }
    fn bind_named(&mut self, name: &str, value: Value) -> CResult<()> {
        let slot = self
            .rewritten
            .name_to_index
            .get(name)
            .copied()
            .ok_or_else(|| ReError::BindingError(format!("no parameter named :{name} in this statement")))?;
        // `name_to_index` is 0-based; `Bindable::bind_value` is 1-based.
        self.slots.bind_value(slot + 1, value)
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

impl Statement for PostgresStatement {
    fn state(&self) -> StatementState {
        self.state
    }

    fn prepare(&mut self) -> CResult<()> {
        if self.state == StatementState::Closed {
            return Err(ReError::database("statement is closed"));
        }
        let handle = self
            .client
            .borrow_mut()
            .prepare(&self.prepared_sql)
            .map_err(|e| map_pg_err(e, &self.prepared_sql))?;
        self.handle = Some(handle);
        self.state = StatementState::Prepared;
        Ok(())
    }

    fn execute(&mut self) -> CResult<Box<dyn Resultset>> {
        if self.state == StatementState::Closed {
            return Err(ReError::database("statement is closed"));
        }
        if self.state == StatementState::Fresh {
            self.prepare()?;
        }
        let handle = self.handle.clone().expect("prepared statement handle missing");

        let mut bound = self.slots.values();
        bound.resize(self.rewritten.slot_count.max(bound.len()), Value::Null);
        let wrapped: Vec<PgValue> = bound.into_iter().map(PgValue).collect();
        let params: Vec<&(dyn ToSql + Sync)> = wrapped.iter().map(|v| v as &(dyn ToSql + Sync)).collect();

        let result = self.client.borrow_mut().query(&handle, &params).map_err(|e| map_pg_err(e, &self.prepared_sql));

        match result {
            Ok(rows) => {
                let columns: Arc<[ColumnDefinition]> = Arc::from(
                    rows.first()
                        .map(|row| {
                            row.columns()
                                .iter()
                                .enumerate()
                                .map(|(i, c)| ColumnDefinition::new(c.name().to_string(), i, 0, category_of(c.type_()), true))
                                .collect::<Vec<_>>()
                        })
                        .unwrap_or_default(),
                );

                let out: Vec<Row> = rows
                    .iter()
                    .map(|row| {
                        let cells: Vec<Option<Value>> = (0..columns.len())
                            .map(|i| {
                                let v = value_at(row, i);
                                if v.is_null() {
                                    None
                                } else {
                                    Some(v)
                                }
                            })
                            .collect();
                        Row::new(cells, columns.clone())
                    })
                    .collect();

                self.state = StatementState::Executed;
                Ok(Box::new(PostgresStmtResultset { cursor: RowCursor::buffered(out), columns }))
            }
            Err(e) => {
                self.state = StatementState::Errored;
                Err(e)
            }
        }
    }

    fn reset(&mut self) -> CResult<()> {
        if self.state == StatementState::Closed {
            return Err(ReError::database("statement is closed"));
        }
        self.state = StatementState::Prepared;
        Ok(())
    }

    fn close(&mut self) -> CResult<()> {
        self.handle = None;
        self.state = StatementState::Closed;
        Ok(())
    }

    fn sql(&self) -> &str {
        &self.template
    }
}

pub(crate) fn map_pg_err(err: postgres::Error, sql: &str) -> ReError {
    ReError::database_with_context(err.to_string(), sql)
}

struct PostgresStmtResultset {
    cursor: RowCursor,
    columns: Arc<[ColumnDefinition]>,
}

impl Resultset for PostgresStmtResultset {
    fn state(&self) -> ResultsetState {
        self.cursor.state()
    }
    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }
    fn next(&mut self) -> CResult<Option<Row>> {
        Ok(self.cursor.advance()?.cloned())
    }
    fn is_valid(&self) -> bool {
        self.cursor.is_valid()
    }
}
