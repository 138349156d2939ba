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

use crate::convert::{category_of, value_at};
use crate::statement::{map_pg_err, PostgresStatement};

pub struct PostgresSession {
    client: Rc<RefCell<postgres::Client>>,
    open: bool,
    busy: Rc<Cell<bool>>,
}

impl PostgresSession {
    pub fn connect(config: &str) -> Result<Self, postgres::Error> {
        debug!("connecting to postgres");
        let client = postgres::Client::connect(config, postgres::NoTls).map_err(|e| {
            error!("postgres connection failed: {}", e);
            e
        })?;
        Ok(PostgresSession { client: Rc::new(RefCell::new(client)), open: true, busy: Rc::new(Cell::new(false)) })
    }

    /// Materializes every row of an already-run query into owned `Row`s.
    /// Same rationale as the mysql driver: `postgres::RowIter` borrows the
    /// `Client`, which doesn't fit behind `Box<dyn Resultset>` without a
    /// self-referential-struct crate outside the teacher/pack stack.
    fn rows_to_resultset(rows: Vec<postgres::Row>) -> (std::sync::Arc<[ColumnDefinition]>, Vec<common::row::Row>) {
        let columns: std::sync::Arc<[ColumnDefinition]> = std::sync::Arc::from(
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

        let out = rows
            .iter()
            .map(|row| {
                let cells: Vec<Option<common::value::Value>> = (0..columns.len())
                    .map(|i| {
                        let v = value_at(row, i);
                        if v.is_null() {
                            None
                        } else {
                            Some(v)
                        }
                    })
                    .collect();
                common::row::Row::new(cells, columns.clone())
            })
            .collect();

        (columns, out)
    }
}

impl Session for PostgresSession {
    fn open(&mut self) -> CResult<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> CResult<()> {
        debug!("closing postgres session");
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
        let rows = self.client.borrow_mut().query(sql, &[]).map_err(|e| {
            error!("postgres query failed: {}", e);
            map_pg_err(e, sql)
        })?;
        let (columns, rows) = Self::rows_to_resultset(rows);
        Ok(Box::new(PostgresResultset { cursor: RowCursor::buffered(rows), columns }))
    }

    fn create_statement(&self, sql: &str) -> CResult<Box<dyn Statement>> {
        if !self.open {
            return Err(ReError::database("session is closed"));
        }
        let guard = InFlightGuard::try_acquire(&self.busy)?;
        Ok(Box::new(PostgresStatement::new(self.client.clone(), sql, guard)?))
    }

    fn create_transaction(&self) -> CResult<Box<dyn Transaction>> {
        Ok(Box::new(PostgresTransaction {
            client: self.client.clone(),
            isolation: Isolation::None,
            access_mode: AccessMode::None,
            state: TransactionState::Inactive,
        }))
    }

    fn last_insert_id(&self) -> CResult<i64> {
        // PostgreSQL has no native last-insert-id; callers add a RETURNING
        // clause to their INSERT and read it from the Resultset instead
        // (see `Capabilities::last_insert_id`).
        Err(ReError::Unsupported("last_insert_id: use RETURNING on PostgreSQL"))
    }

    fn last_number_of_changes(&self) -> CResult<u64> {
        Ok(0)
    }

    fn last_error(&self) -> Option<String> {
        None
    }

    fn query_schema(&self, db_name: &str, table_name: &str, out: &mut Vec<ColumnDefinition>) -> CResult<()> {
        let sql = "SELECT column_name, data_type, is_nullable, ordinal_position \
                    FROM information_schema.columns \
                    WHERE table_schema = $1 AND table_name = $2 \
                    ORDER BY ordinal_position";
        let schema = if db_name.is_empty() { "public" } else { db_name };

        let rows = self
            .client
            .borrow_mut()
            .query(sql, &[&schema, &table_name])
            .map_err(|e| map_pg_err(e, sql))?;

        if rows.is_empty() {
            return Err(ReError::NoSuchColumn(table_name.to_string()));
        }

        for row in &rows {
            let name: String = row.get(0);
            let decl_type: String = row.get(1);
            let is_nullable: String = row.get(2);
            let ordinal: i32 = row.get(3);
            out.push(ColumnDefinition::new(
                name,
                (ordinal - 1) as usize,
                0,
                category_from_type_string(&decl_type),
                is_nullable.eq_ignore_ascii_case("YES"),
            ));
        }
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            native_param_style: ParamStyle::DollarNumber,
            named_params_native: false,
            buffered_resultsets: true,
            streaming_resultsets: false,
            savepoints: true,
            last_insert_id: LastInsertIdStrategy::ReturningClause,
        }
    }
}

fn category_from_type_string(decl_type: &str) -> common::column::ColumnCategory {
    use common::column::ColumnCategory;
    let ty = decl_type.to_ascii_lowercase();
    if ty.contains("int") {
        ColumnCategory::Integer
    } else if ty.contains("char") || ty.contains("text") {
        ColumnCategory::Text
    } else if ty.contains("bytea") {
        ColumnCategory::Blob
    } else if ty.contains("numeric") || ty.contains("real") || ty.contains("double") {
        ColumnCategory::Real
    } else if ty.contains("date") || ty.contains("time") {
        ColumnCategory::Temporal
    } else {
        ColumnCategory::Unknown
    }
}

struct PostgresResultset {
    cursor: RowCursor,
    columns: std::sync::Arc<[ColumnDefinition]>,
}

impl Resultset for PostgresResultset {
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

struct PostgresTransaction {
    client: Rc<RefCell<postgres::Client>>,
    isolation: Isolation,
    access_mode: AccessMode,
    state: TransactionState,
}

impl Transaction for PostgresTransaction {
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
        self.client
            .borrow_mut()
            .batch_execute(&sql)
            .map_err(|e| map_pg_err(e, &sql))?;
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
                self.client
                    .borrow_mut()
                    .batch_execute("COMMIT")
                    .map_err(|e| map_pg_err(e, "COMMIT"))?;
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
                self.client
                    .borrow_mut()
                    .batch_execute("ROLLBACK")
                    .map_err(|e| map_pg_err(e, "ROLLBACK"))?;
            }
            TransactionState::Inactive => {}
        }
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.client
            .borrow_mut()
            .query_one("SELECT txid_current_if_assigned() IS NOT NULL", &[])
            .ok()
            .map(|row| row.get::<_, bool>(0))
            .unwrap_or(self.state == TransactionState::Active)
    }

    fn savepoint(&mut self, name: &str) -> CResult<()> {
        let sql = format!("SAVEPOINT {name}");
        self.client.borrow_mut().batch_execute(&sql).map_err(|e| map_pg_err(e, &sql))
    }

    fn release(&mut self, name: &str) -> CResult<()> {
        let sql = format!("RELEASE SAVEPOINT {name}");
        self.client.borrow_mut().batch_execute(&sql).map_err(|e| map_pg_err(e, &sql))
    }

    fn rollback_to(&mut self, name: &str) -> CResult<()> {
        let sql = format!("ROLLBACK TO SAVEPOINT {name}");
        self.client.borrow_mut().batch_execute(&sql).map_err(|e| map_pg_err(e, &sql))
    }
}
