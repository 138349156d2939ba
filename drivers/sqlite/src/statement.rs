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

use crate::convert::{category_of, from_sqlite, to_sqlite};

/// A Statement bound to a shared SQLite connection. SQLite has no
/// persistent server-side prepared-statement handle worth keeping across
/// `execute()` calls from this crate's perspective — `rusqlite::Statement`
/// borrows from the `Connection` it was prepared against, so this type
/// re-prepares on every `execute()` and treats `Prepared` as "the SQL text
/// parsed cleanly at least once", matching the state machine in spec.md §4.4
/// without fighting the borrow checker over a self-referential handle.
///
/// SQLite accepts `?`, `:name` and `@name` natively (spec.md §6), so unlike
/// the MySQL/PostgreSQL drivers this one never rewrites the SQL text —
/// `paramstyle::rewrite` is still run once at construction time purely to
/// compute `slot_count`/`name_to_index` in the same left-to-right,
/// dedup-on-repeat order SQLite itself assigns parameter numbers in.
pub struct SqliteStatement {
    conn: Rc<RefCell<rusqlite::Connection>>,
    template: String,
    rewritten: RewrittenSql,
    state: StatementState,
    slots: BindSlots,
    _guard: InFlightGuard,
}

impl SqliteStatement {
    pub(crate) fn new(
        conn: Rc<RefCell<rusqlite::Connection>>,
        sql: impl Into<String>,
        guard: InFlightGuard,
    ) -> CResult<Self> {
        let template = sql.into();
        let rewritten = paramstyle::rewrite(&template, ParamStyle::Named, true)?;
        Ok(SqliteStatement {
            conn,
            template,
            rewritten,
            state: StatementState::Fresh,
            slots: BindSlots::new(),
            _guard: guard,
        })
    }
}

impl Bindable for SqliteStatement {
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

impl Statement for SqliteStatement {
    fn state(&self) -> StatementState {
        self.state
    }

    fn prepare(&mut self) -> CResult<()> {
        if self.state == StatementState::Closed {
            return Err(ReError::database("statement is closed"));
        }
        let conn = self.conn.borrow();
        conn.prepare(&self.template).map_err(|e| map_sqlite_err(e, &self.template))?;
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

        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(&self.template).map_err(|e| map_sqlite_err(e, &self.template))?;

        let columns: Vec<ColumnDefinition> = (0..stmt.column_count())
            .map(|i| {
                let name = stmt.column_name(i).unwrap_or("").to_string();
                let decl = stmt.column_decl_type(i).map(str::to_string);
                ColumnDefinition::new(name, i, 0, category_of(decl.as_deref()), true)
            })
            .collect();
        let columns: Arc<[ColumnDefinition]> = Arc::from(columns);

        let mut bound = self.slots.values();
        bound.resize(self.rewritten.slot_count.max(bound.len()), Value::Null);
        let params: Vec<rusqlite::types::Value> = bound.iter().map(to_sqlite).collect();
        let decl_types: Vec<Option<String>> = (0..stmt.column_count())
            .map(|i| stmt.column_decl_type(i).map(str::to_string))
            .collect();

        let rows_result: rusqlite::Result<Vec<Row>> = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                let mut cells = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    let value_ref = row.get_ref(i)?;
                    let decl = decl_types[i].as_deref();
                    let value = from_sqlite(value_ref, decl);
                    cells.push(if value.is_null() { None } else { Some(value) });
                }
                Ok(Row::new(cells, columns.clone()))
            })
            .and_then(|mapped| mapped.collect());

        match rows_result {
            Ok(rows) => {
                self.state = StatementState::Executed;
                Ok(Box::new(SqliteResultset {
                    cursor: RowCursor::buffered(rows),
                    columns,
                }))
            }
            Err(e) => {
                self.state = StatementState::Errored;
                Err(map_sqlite_err(e, &self.template))
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
        self.state = StatementState::Closed;
        Ok(())
    }

    fn sql(&self) -> &str {
        &self.template
    }
}

pub(crate) fn map_sqlite_err(err: rusqlite::Error, sql: &str) -> ReError {
    ReError::database_with_context(err.to_string(), sql)
}

struct SqliteResultset {
    cursor: RowCursor,
    columns: Arc<[ColumnDefinition]>,
}

impl Resultset for SqliteResultset {
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
