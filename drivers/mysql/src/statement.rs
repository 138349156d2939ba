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
use mysql::prelude::Queryable;

use crate::convert::{category_of, from_mysql, nullable, to_mysql};

/// A Statement bound to a shared MySQL connection. `?` is MySQL's only
/// placeholder (spec.md §6); `$N` and `:name`/`@name` forms are rewritten to
/// plain `?` at construction time via `paramstyle::rewrite` before the SQL
/// is ever handed to the server. The `mysql` crate's own `Statement` handle
/// is held once `prepare()` succeeds and reused across `execute()`/`reset()`
/// calls, unlike the SQLite driver which re-prepares every call because
/// `rusqlite::Statement` borrows its `Connection`.
pub struct MysqlStatement {
    conn: Rc<RefCell<mysql::Conn>>,
    template: String,
    prepared_sql: String,
    rewritten: RewrittenSql,
    state: StatementState,
    slots: BindSlots,
    handle: Option<mysql::Statement>,
    _guard: InFlightGuard,
}

impl MysqlStatement {
    pub(crate) fn new(conn: Rc<RefCell<mysql::Conn>>, sql: impl Into<String>, guard: InFlightGuard) -> CResult<Self> {
        let template = sql.into();
        let rewritten = paramstyle::rewrite(&template, ParamStyle::QuestionMark, true)?;
        let prepared_sql = rewritten.sql.clone();
        Ok(MysqlStatement {
            conn,
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

impl Bindable for MysqlStatement {
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

impl Statement for MysqlStatement {
    fn state(&self) -> StatementState {
        self.state
    }

    fn prepare(&mut self) -> CResult<()> {
        if self.state == StatementState::Closed {
            return Err(ReError::database("statement is closed"));
        }
        let stmt = self.conn.borrow_mut().prep(&self.prepared_sql).map_err(|e| map_mysql_err(e, &self.prepared_sql))?;
        self.handle = Some(stmt);
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
        let handle = self.handle.as_ref().expect("prepared statement handle missing").clone();

        let mut bound = self.slots.values();
        bound.resize(self.rewritten.slot_count.max(bound.len()), Value::Null);
        let params: Vec<mysql::Value> = bound.iter().map(to_mysql).collect();
        let mut conn = self.conn.borrow_mut();
        let result = conn
            .exec_iter(&handle, mysql::Params::Positional(params))
            .map_err(|e| map_mysql_err(e, &self.prepared_sql));

        match result {
            Ok(result) => {
                let column_info: Vec<(String, mysql::consts::ColumnType, bool)> = result
                    .columns()
                    .as_ref()
                    .iter()
                    .map(|c| (c.name_str().into_owned(), c.column_type(), nullable(c)))
                    .collect();
                let columns: Arc<[ColumnDefinition]> = Arc::from(
                    column_info
                        .iter()
                        .enumerate()
                        .map(|(i, (name, ty, null))| {
                            ColumnDefinition::new(name.clone(), i, *ty as i64, category_of(*ty), *null)
                        })
                        .collect::<Vec<_>>(),
                );

                let mut rows = Vec::new();
                for row_result in result {
                    let mut row = row_result.map_err(|e| map_mysql_err(e, &self.prepared_sql))?;
                    let mut cells = Vec::with_capacity(column_info.len());
                    for i in 0..column_info.len() {
                        let (_, ty, _) = column_info[i];
                        let value = row.take(i).unwrap_or(mysql::Value::NULL);
                        let value = from_mysql(value, ty);
                        cells.push(if value.is_null() { None } else { Some(value) });
                    }
                    rows.push(Row::new(cells, columns.clone()));
                }

                self.state = StatementState::Executed;
                Ok(Box::new(MysqlStmtResultset { cursor: RowCursor::buffered(rows), columns }))
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
        if let Some(handle) = self.handle.take() {
            let _ = self.conn.borrow_mut().close(handle);
        }
        self.state = StatementState::Closed;
        Ok(())
    }

    fn sql(&self) -> &str {
        &self.template
    }
}

pub(crate) fn map_mysql_err(err: mysql::Error, sql: &str) -> ReError {
    ReError::database_with_context(err.to_string(), sql)
}

struct MysqlStmtResultset {
    cursor: RowCursor,
    columns: Arc<[ColumnDefinition]>,
}

impl Resultset for MysqlStmtResultset {
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
