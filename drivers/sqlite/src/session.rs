use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::column::ColumnDefinition;
use common::err::{CResult, ReError};
use core_db::paramstyle::ParamStyle;
use core_db::resultset::{Resultset, ResultsetState, RowCursor};
use core_db::session::{Capabilities, InFlightGuard, LastInsertIdStrategy, Session};
use core_db::statement::Statement;
use core_db::transaction::{build_start_sql, AccessMode, Isolation, Transaction, TransactionState};
use tracing::{debug, error};

use crate::convert::{category_of, from_sqlite};
use crate::statement::{map_sqlite_err, SqliteStatement};

pub struct SqliteSession {
    conn: Rc<RefCell<rusqlite::Connection>>,
    open: bool,
    busy: Rc<Cell<bool>>,
}

impl SqliteSession {
    pub fn open_file(path: &str) -> rusqlite::Result<Self> {
        debug!("opening sqlite database at {}", path);
        let conn = rusqlite::Connection::open(path)?;
        Ok(SqliteSession { conn: Rc::new(RefCell::new(conn)), open: true, busy: Rc::new(Cell::new(false)) })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        debug!("opening in-memory sqlite database");
        let conn = rusqlite::Connection::open_in_memory()?;
        Ok(SqliteSession { conn: Rc::new(RefCell::new(conn)), open: true, busy: Rc::new(Cell::new(false)) })
    }
}

impl Session for SqliteSession {
    fn open(&mut self) -> CResult<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> CResult<()> {
        debug!("closing sqlite session");
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn execute(&mut self, sql: &str) -> CResult<Box<dyn Resultset>> {
        if !self.open {
            return Err(ReError::database("session is closed"));
        }
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(sql).map_err(|e| {
            error!("failed to prepare sql: {}", sql);
            map_sqlite_err(e, sql)
        })?;

        let columns: std::sync::Arc<[ColumnDefinition]> = std::sync::Arc::from(
            (0..stmt.column_count())
                .map(|i| {
                    let name = stmt.column_name(i).unwrap_or("").to_string();
                    let decl = stmt.column_decl_type(i).map(str::to_string);
                    ColumnDefinition::new(name, i, 0, category_of(decl.as_deref()), true)
                })
                .collect::<Vec<_>>(),
        );
        let decl_types: Vec<Option<String>> = (0..stmt.column_count())
            .map(|i| stmt.column_decl_type(i).map(str::to_string))
            .collect();

        let rows = stmt
            .query_map([], |row| {
                let mut cells = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    let value_ref = row.get_ref(i)?;
                    let value = from_sqlite(value_ref, decl_types[i].as_deref());
                    cells.push(if value.is_null() { None } else { Some(value) });
                }
                Ok(common::row::Row::new(cells, columns.clone()))
            })
            .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| map_sqlite_err(e, sql))?;

        Ok(Box::new(ExecResultset { cursor: RowCursor::buffered(rows), columns }))
    }

    fn create_statement(&self, sql: &str) -> CResult<Box<dyn Statement>> {
        if !self.open {
            return Err(ReError::database("session is closed"));
        }
        let guard = InFlightGuard::try_acquire(&self.busy)?;
        Ok(Box::new(SqliteStatement::new(self.conn.clone(), sql, guard)?))
    }

    fn create_transaction(&self) -> CResult<Box<dyn Transaction>> {
        Ok(Box::new(SqliteTransaction {
            conn: self.conn.clone(),
            isolation: Isolation::None,
            access_mode: AccessMode::None,
            state: TransactionState::Inactive,
        }))
    }

    fn last_insert_id(&self) -> CResult<i64> {
        Ok(self.conn.borrow().last_insert_rowid())
    }

    fn last_number_of_changes(&self) -> CResult<u64> {
        Ok(self.conn.borrow().changes())
    }

    fn last_error(&self) -> Option<String> {
        None
    }

    fn query_schema(&self, _db_name: &str, table_name: &str, out: &mut Vec<ColumnDefinition>) -> CResult<()> {
        let conn = self.conn.borrow();
        let sql = format!("PRAGMA table_info({table_name})");
        let mut stmt = conn.prepare(&sql).map_err(|e| map_sqlite_err(e, &sql))?;

        let rows = stmt
            .query_map([], |row| {
                let ordinal: i64 = row.get(0)?;
                let name: String = row.get(1)?;
                let decl_type: String = row.get(2)?;
                let not_null: i64 = row.get(3)?;
                Ok((ordinal as usize, name, decl_type, not_null == 0))
            })
            .map_err(|e| map_sqlite_err(e, &sql))?;

        for row in rows {
            let (ordinal, name, decl_type, nullable) = row.map_err(|e| map_sqlite_err(e, &sql))?;
            out.push(ColumnDefinition::new(name, ordinal, 0, category_of(Some(&decl_type)), nullable));
        }

        if out.is_empty() {
            return Err(ReError::NoSuchColumn(table_name.to_string()));
        }
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            native_param_style: ParamStyle::QuestionMark,
            named_params_native: true,
            buffered_resultsets: true,
            streaming_resultsets: false,
            savepoints: true,
            last_insert_id: LastInsertIdStrategy::Native,
        }
    }
}

struct ExecResultset {
    cursor: RowCursor,
    columns: std::sync::Arc<[ColumnDefinition]>,
}

impl Resultset for ExecResultset {
    fn state(&self) -> ResultsetState {
        self.cursor.state()
    }
    fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }
    fn next(&mut self) -> CResult<Option<common::row::Row>> {
        Ok(self.cursor.advance()?.cloned())
    }
    fn is_valid(&self) -> bool {
        self.cursor.is_valid()
    }
}

struct SqliteTransaction {
    conn: Rc<RefCell<rusqlite::Connection>>,
    isolation: Isolation,
    access_mode: AccessMode,
    state: TransactionState,
}

impl Transaction for SqliteTransaction {
    fn state(&self) -> TransactionState {
        self.state
    }
    fn isolation(&self) -> Isolation {
        self.isolation
    }
    fn access_mode(&self) -> AccessMode {
        self.access_mode
    }
    fn deferrable(&self) -> bool {
        false
    }

    fn start(&mut self) -> CResult<()> {
        if self.state != TransactionState::Inactive {
            return Err(ReError::TransactionException("transaction already started".into()));
        }
        let sql = build_start_sql("BEGIN", self.isolation, self.access_mode, false);
        self.conn
            .borrow()
            .execute_batch(&sql)
            .map_err(|e| map_sqlite_err(e, &sql))?;
        self.state = TransactionState::Active;
        Ok(())
    }

    fn commit(&mut self) -> CResult<()> {
        // spec.md §4.7: legal from any non-terminal state. A transaction
        // that never `start()`-ed has nothing open on the connection, so
        // committing it is a pure state transition rather than a `COMMIT`
        // round trip.
        match self.state {
            TransactionState::Committed | TransactionState::RolledBack => {
                return Err(ReError::TransactionException("transaction already resolved".into()));
            }
            TransactionState::Active => {
                self.conn
                    .borrow()
                    .execute_batch("COMMIT")
                    .map_err(|e| map_sqlite_err(e, "COMMIT"))?;
            }
            TransactionState::Inactive => {}
        }
        self.state = TransactionState::Committed;
        Ok(())
    }

    fn rollback(&mut self) -> CResult<()> {
        match self.state {
            TransactionState::Committed | TransactionState::RolledBack => {
                return Err(ReError::TransactionException("transaction already resolved".into()));
            }
            TransactionState::Active => {
                self.conn
                    .borrow()
                    .execute_batch("ROLLBACK")
                    .map_err(|e| map_sqlite_err(e, "ROLLBACK"))?;
            }
            TransactionState::Inactive => {}
        }
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.conn.borrow().is_autocommit()
    }

    fn savepoint(&mut self, name: &str) -> CResult<()> {
        let sql = format!("SAVEPOINT {name}");
        self.conn.borrow().execute_batch(&sql).map_err(|e| map_sqlite_err(e, &sql))
    }

    fn release(&mut self, name: &str) -> CResult<()> {
        let sql = format!("RELEASE SAVEPOINT {name}");
        self.conn.borrow().execute_batch(&sql).map_err(|e| map_sqlite_err(e, &sql))
    }

    fn rollback_to(&mut self, name: &str) -> CResult<()> {
        let sql = format!("ROLLBACK TO SAVEPOINT {name}");
        self.conn.borrow().execute_batch(&sql).map_err(|e| map_sqlite_err(e, &sql))
    }
}
