pub use common::config::SessionOptions;
use std::cell::Cell;
use std::rc::Rc;

use common::column::ColumnDefinition;
use common::err::{CResult, ReError};

use crate::paramstyle::ParamStyle;
use crate::resultset::Resultset;
use crate::statement::Statement;
use crate::transaction::Transaction;

/// What a backend can and can't do, reported by its `DriverFactory` so
/// generic callers can branch on capability rather than backend identity
/// (spec.md §6's capability table).
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub native_param_style: ParamStyle,
    pub named_params_native: bool,
    pub buffered_resultsets: bool,
    pub streaming_resultsets: bool,
    pub savepoints: bool,
    pub last_insert_id: LastInsertIdStrategy,
}

/// How `Session::last_insert_id()` is implemented for a given backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastInsertIdStrategy {
    /// backend exposes a direct API (`sqlite3_last_insert_rowid`,
    /// `mysql_insert_id`).
    Native,
    /// backend has no native concept; callers must add a `RETURNING`
    /// clause themselves (PostgreSQL).
    ReturningClause,
}

/// A live backend connection (C2). Owns its connection exclusively; a
/// Statement holds a shared reference back to its Session.
pub trait Session {
    fn open(&mut self) -> CResult<()>;
    fn close(&mut self) -> CResult<()>;
    fn is_open(&self) -> bool;

    /// Executes `sql` directly, returning a Resultset. May run a
    /// multi-statement script where the backend allows it.
    fn execute(&mut self, sql: &str) -> CResult<Box<dyn Resultset>>;

    /// Returns an unprepared Statement bound to this Session. Only one
    /// Statement may be in flight at a time; a second concurrent attempt
    /// is `ConcurrentUse`.
    fn create_statement(&self, sql: &str) -> CResult<Box<dyn Statement>>;

    /// Returns an Inactive Transaction bound to this Session.
    fn create_transaction(&self) -> CResult<Box<dyn Transaction>>;

    fn last_insert_id(&self) -> CResult<i64>;
    fn last_number_of_changes(&self) -> CResult<u64>;
    fn last_error(&self) -> Option<String>;

    /// Fills `out` with the column definitions of `table_name` in
    /// `db_name` (empty string means "current database").
    fn query_schema(&self, db_name: &str, table_name: &str, out: &mut Vec<ColumnDefinition>) -> CResult<()>;

    fn capabilities(&self) -> Capabilities;
}

/// Best-effort "only one Statement in flight" guard (spec.md §4.2, §7):
/// a Session holds an `Rc<Cell<bool>>`, hands a clone to each driver
/// Statement via `try_acquire`, and `create_statement` refuses a second
/// concurrent attempt with `ConcurrentUse`. The flag self-clears on Drop,
/// so it only ever reflects whatever Statement a caller is currently
/// holding — not a lock, just a same-thread tripwire.
pub struct InFlightGuard(Rc<Cell<bool>>);

impl InFlightGuard {
    pub fn try_acquire(flag: &Rc<Cell<bool>>) -> CResult<Self> {
        if flag.get() {
            return Err(ReError::ConcurrentUse);
        }
        flag.set(true);
        Ok(InFlightGuard(flag.clone()))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
