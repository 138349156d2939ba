use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use common::column::ColumnDefinition;
use common::err::{CResult, ReError};
use common::row::Row;
use core_db::paramstyle::ParamStyle;
use core_db::resultset::{Resultset, ResultsetState, RowCursor};
use core_db::session::{Capabilities, InFlightGuard, LastInsertIdStrategy, Session};
use core_db::statement::Statement;
use core_db::transaction::{build_start_sql, AccessMode, Isolation, Transaction, TransactionState};
use mysql::prelude::Queryable;
use tracing::{debug, error};

use crate::convert::{category_of, from_mysql, nullable};
use crate::statement::{map_mysql_err, MysqlStatement};

pub struct MysqlSession {
    conn: Rc<RefCell<mysql::Conn>>,
    open: bool,
    busy: Rc<Cell<bool>>,
}

impl MysqlSession {
    pub fn connect(url: &str) -> mysql::Result<Self> {
        let opts = mysql::Opts::from_url(url)?;
        Self::connect_with_opts(opts)
    }

    pub fn connect_with_opts(opts: mysql::Opts) -> mysql::Result<Self> {
        debug!("connecting to mysql at {}:{}", opts.get_ip_or_hostname(), opts.get_tcp_port());
        let conn = mysql::Conn::new(opts).map_err(|e| {
            error!("mysql connection failed: {}", e);
            e
        })?;
        Ok(MysqlSession { conn: Rc::new(RefCell::new(conn)), open: true, busy: Rc::new(Cell::new(false)) })
    }

    /// Materializes every row of an already-run query into owned `Row`s.
    /// See DESIGN.md for why this driver buffers rather than streaming: the
    /// `mysql` crate's `QueryResult` borrows the `Conn` for its lifetime,
    /// which does not fit behind this crate's `Box<dyn Resultset>` without a
    /// self-referential-struct crate outside the teacher/pack stack.
    fn collect_rows<T: mysql::prelude::Protocol>(
        result: mysql::QueryResult<'_, '_, '_, T>,
    ) -> CResult<(Arc<[ColumnDefinition]>, Vec<Row>)> {
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
                .map(|(i, (name, ty, null))| ColumnDefinition::new(name.clone(), i, *ty as i64, category_of(*ty), *null))
                .collect::<Vec<_>>(),
        );

        let mut rows = Vec::new();
        for row_result in result {
            let mut row = row_result.map_err(|e| ReError::database(e.to_string()))?;
            let mut cells = Vec::with_capacity(column_info.len());
            for i in 0..column_info.len() {
                let (_, ty, _) = column_info[i];
                let value = row.take(i).unwrap_or(mysql::Value::NULL);
                let value = from_mysql(value, ty);
                cells.push(if value.is_null() { None } else { Some(value) });
            }
            rows.push(Row::new(cells, columns.clone()));
        }

        Ok((columns, rows))
    }
}

impl Session for MysqlSession {
    fn open(&mut self) -> CResult<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> CResult<()> {
        debug!("closing mysql session");
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
        let mut conn = self.conn.borrow_mut();
        let result = conn.query_iter(sql).map_err(|e| {
            error!("mysql query failed: {}", e);
            ReError::database_with_context(e.to_string(), sql)
        })?;
        let (columns, rows) = Self::collect_rows(result)?;
        Ok(Box::new(MysqlResultset { cursor: RowCursor::buffered(rows), columns }))
    }

    fn create_statement(&self, sql: &str) -> CResult<Box<dyn Statement>> {
        if !self.open {
            return Err(ReError::database("session is closed"));
        }
        let guard = InFlightGuard::try_acquire(&self.busy)?;
        Ok(Box::new(MysqlStatement::new(self.conn.clone(), sql, guard)?))
    }

    fn create_transaction(&self) -> CResult<Box<dyn Transaction>> {
        Ok(Box::new(MysqlTransaction {
            conn: self.conn.clone(),
            isolation: Isolation::None,
            access_mode: AccessMode::None,
            state: TransactionState::Inactive,
        }))
    }

    fn last_insert_id(&self) -> CResult<i64> {
        Ok(self.conn.borrow().last_insert_id() as i64)
    }

    fn last_number_of_changes(&self) -> CResult<u64> {
        Ok(self.conn.borrow().affected_rows())
    }

    fn last_error(&self) -> Option<String> {
        None
    }

    fn query_schema(&self, db_name: &str, table_name: &str, out: &mut Vec<ColumnDefinition>) -> CResult<()> {
        let mut conn = self.conn.borrow_mut();
        let sql = if db_name.is_empty() {
            format!("SHOW COLUMNS FROM {table_name}")
        } else {
            format!("SHOW COLUMNS FROM {db_name}.{table_name}")
        };

        let rows: Vec<mysql::Row> = conn.query(&sql).map_err(|e| ReError::database_with_context(e.to_string(), &sql))?;

        if rows.is_empty() {
            return Err(ReError::NoSuchColumn(table_name.to_string()));
        }

        for (ordinal, row) in rows.into_iter().enumerate() {
            let name: String = row.get("Field").unwrap_or_default();
            let decl_type: String = row.get("Type").unwrap_or_default();
            let null_flag: String = row.get("Null").unwrap_or_default();
            out.push(ColumnDefinition::new(
                name,
                ordinal,
                0,
                category_from_type_string(&decl_type),
                null_flag.eq_ignore_ascii_case("YES"),
            ));
        }
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            native_param_style: ParamStyle::QuestionMark,
            named_params_native: false,
            buffered_resultsets: true,
            streaming_resultsets: false,
            savepoints: true,
            last_insert_id: LastInsertIdStrategy::Native,
        }
    }
}

fn category_from_type_string(decl_type: &str) -> common::column::ColumnCategory {
    use common::column::ColumnCategory;
    let ty = decl_type.to_ascii_lowercase();
    if ty.contains("int") {
        ColumnCategory::Integer
    } else if ty.contains("char") || ty.contains("text") || ty.contains("enum") {
        ColumnCategory::Text
    } else if ty.contains("blob") || ty.contains("binary") {
        ColumnCategory::Blob
    } else if ty.contains("float") || ty.contains("double") || ty.contains("decimal") {
        ColumnCategory::Real
    } else if ty.contains("date") || ty.contains("time") {
        ColumnCategory::Temporal
    } else {
        ColumnCategory::Unknown
    }
}

struct MysqlResultset {
    cursor: RowCursor,
    columns: Arc<[ColumnDefinition]>,
}

impl Resultset for MysqlResultset {
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

struct MysqlTransaction {
    conn: Rc<RefCell<mysql::Conn>>,
    isolation: Isolation,
    access_mode: AccessMode,
    state: TransactionState,
}

impl Transaction for MysqlTransaction {
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
        let sql = build_start_sql("START TRANSACTION", self.isolation, self.access_mode, false);
        self.conn
            .borrow_mut()
            .query_drop(&sql)
            .map_err(|e| map_mysql_err(e, &sql))?;
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
                self.conn.borrow_mut().query_drop("COMMIT").map_err(|e| map_mysql_err(e, "COMMIT"))?;
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
                    .borrow_mut()
                    .query_drop("ROLLBACK")
                    .map_err(|e| map_mysql_err(e, "ROLLBACK"))?;
            }
            TransactionState::Inactive => {}
        }
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.conn
            .borrow_mut()
            .query_first::<i64, _>("SELECT @@in_transaction")
            .ok()
            .flatten()
            .map(|v| v != 0)
            .unwrap_or(self.state == TransactionState::Active)
    }

    fn savepoint(&mut self, name: &str) -> CResult<()> {
        let sql = format!("SAVEPOINT {name}");
        self.conn.borrow_mut().query_drop(&sql).map_err(|e| map_mysql_err(e, &sql))
    }

    fn release(&mut self, name: &str) -> CResult<()> {
        let sql = format!("RELEASE SAVEPOINT {name}");
        self.conn.borrow_mut().query_drop(&sql).map_err(|e| map_mysql_err(e, &sql))
    }

    fn rollback_to(&mut self, name: &str) -> CResult<()> {
        let sql = format!("ROLLBACK TO SAVEPOINT {name}");
        self.conn.borrow_mut().query_drop(&sql).map_err(|e| map_mysql_err(e, &sql))
    }
}
