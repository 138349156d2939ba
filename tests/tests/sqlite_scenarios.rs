use common::value::Value;
use core_db::{Bindable, ReError, Resultset, Session, Statement};
use sqlite_driver::SqliteSession;

fn users_session() -> SqliteSession {
    common::log::init_test_log();
    let mut session = SqliteSession::open_in_memory().expect("open in-memory sqlite");
    session
        .execute("CREATE TABLE users(id INTEGER PRIMARY KEY, first_name TEXT, last_name TEXT, dval REAL, data BLOB)")
        .expect("create table");
    session
}

/// S1 — INSERT + SELECT round trip.
#[test]
fn insert_and_select_round_trip() {
    let mut session = users_session();

    let mut insert = session
        .create_statement("INSERT INTO users(first_name, last_name, dval, data) VALUES(?, ?, ?, ?)")
        .unwrap();
    insert.bind_value(1, Value::Text("Bryan".into())).unwrap();
    insert.bind_value(2, Value::Text("Jenkins".into())).unwrap();
    insert.bind_value(3, Value::Real(3.1456)).unwrap();
    insert.bind_value(4, Value::Blob(vec![0u8; 16])).unwrap();
    insert.execute().unwrap();

    let mut resultset = session.execute("SELECT * FROM users").unwrap();
    let row = resultset.next().unwrap().expect("exactly one row");
    assert!(resultset.next().unwrap().is_none());

    assert_eq!(row.by_name("first_name").unwrap().unwrap().to_text().unwrap(), "Bryan");
    assert_eq!(row.by_name("dval").unwrap().unwrap().to_real().unwrap(), 3.1456);
    assert_eq!(row.by_name("data").unwrap().unwrap().to_blob().unwrap().len(), 16);
}

/// Positional binding is 1-based (spec.md §4.3): slot 1 must fill the
/// statement's first placeholder, not its second.
#[test]
fn positional_binding_starts_at_one() {
    let mut session = users_session();

    let mut insert = session
        .create_statement("INSERT INTO users(first_name, last_name) VALUES(?, ?)")
        .unwrap();
    insert.bind_value(1, Value::Text("Ada".into())).unwrap();
    insert.bind_value(2, Value::Text("Lovelace".into())).unwrap();
    insert.execute().unwrap();

    let mut resultset = session.execute("SELECT * FROM users").unwrap();
    let row = resultset.next().unwrap().expect("exactly one row");
    assert_eq!(row.by_name("first_name").unwrap().unwrap().to_text().unwrap(), "Ada");
    assert_eq!(row.by_name("last_name").unwrap().unwrap().to_text().unwrap(), "Lovelace");

    assert!(matches!(insert.bind_value(0, Value::Null), Err(ReError::BindingError(_))));
}

/// S4 — Transaction rollback on scope exit.
#[test]
fn transaction_rolls_back_on_scope_exit() {
    let mut session = users_session();
    session.execute("INSERT INTO users(first_name) VALUES('Alice')").unwrap();

    let pre_scope_count = count_users(&mut session);

    {
        let transaction = session.create_transaction().unwrap();
        let guard = core_db::TransactionGuard::new(transaction).unwrap();
        session.execute("INSERT INTO users(first_name) VALUES('Bob')").unwrap();
        drop(guard);
    }

    assert_eq!(count_users(&mut session), pre_scope_count);
}

/// Savepoints: rolling back to a savepoint undoes only the work after it,
/// keeping the enclosing transaction active and its earlier work intact.
#[test]
fn rollback_to_savepoint_undoes_only_the_nested_work() {
    let mut session = users_session();

    let mut transaction = session.create_transaction().unwrap();
    transaction.start().unwrap();
    session.execute("INSERT INTO users(first_name) VALUES('Alice')").unwrap();

    transaction.savepoint("before_bob").unwrap();
    session.execute("INSERT INTO users(first_name) VALUES('Bob')").unwrap();
    assert_eq!(count_users(&mut session), 2);

    transaction.rollback_to("before_bob").unwrap();
    assert_eq!(count_users(&mut session), 1);
    assert!(transaction.is_active());

    transaction.commit().unwrap();
    assert_eq!(count_users(&mut session), 1);
}

/// A second Statement checked out while the first is still alive is
/// refused with `ConcurrentUse`; dropping the first clears the way.
#[test]
fn second_statement_while_first_is_live_is_concurrent_use() {
    let mut session = users_session();

    let first = session.create_statement("SELECT * FROM users").unwrap();
    let err = session.create_statement("SELECT * FROM users").unwrap_err();
    assert!(matches!(err, ReError::ConcurrentUse));

    drop(first);
    session.create_statement("SELECT * FROM users").unwrap();
}

fn count_users(session: &mut SqliteSession) -> i64 {
    let mut resultset = session.execute("SELECT COUNT(*) FROM users").unwrap();
    let row = resultset.next().unwrap().unwrap();
    row.at(0).unwrap().unwrap().to_integer().unwrap()
}

/// S5 — Illegal conversion.
#[test]
fn illegal_conversion_raised_on_non_numeric_text() {
    let mut session = users_session();
    session.execute("INSERT INTO users(first_name) VALUES('Bryan')").unwrap();

    let mut resultset = session.execute("SELECT first_name FROM users").unwrap();
    let row = resultset.next().unwrap().unwrap();
    let value = row.at(0).unwrap().unwrap();

    let err = value.to_real().unwrap_err();
    assert!(matches!(err, ReError::IllegalConversion { .. }));
}

/// S6 — Reset mid-iteration.
#[test]
fn reset_mid_iteration_restarts_from_the_first_row() {
    let mut session = users_session();
    session.execute("INSERT INTO users(first_name) VALUES('Alice')").unwrap();
    session.execute("INSERT INTO users(first_name) VALUES('Bob')").unwrap();

    let mut statement = session.create_statement("SELECT first_name FROM users ORDER BY id").unwrap();
    let mut resultset = statement.execute().unwrap();

    let first = resultset.next().unwrap().unwrap();
    assert_eq!(first.at(0).unwrap().unwrap().to_text().unwrap(), "Alice");

    statement.reset().unwrap();
    let mut resultset = statement.execute().unwrap();
    let first_again = resultset.next().unwrap().unwrap();
    assert_eq!(first_again.at(0).unwrap().unwrap().to_text().unwrap(), "Alice");
}

/// S3 — Streaming cursor: a synthetic streaming Resultset over 1000 rows,
/// consumed only through `next()`, never materialized as a `Vec<Row>`. The
/// SQLite driver itself is buffered-only (see DESIGN.md), so this exercises
/// `core_db::RowCursor`'s streaming mode directly.
#[test]
fn streaming_cursor_never_materializes_all_rows_at_once() {
    use common::row::Row;
    use core_db::{CResult, RowCursor};
    use std::sync::Arc;

    let columns: Arc<[core_db::ColumnDefinition]> =
        Arc::from(vec![core_db::ColumnDefinition::new("n", 0, 0, core_db::ColumnCategory::Integer, false)]);

    let rows = (0..1000).map(move |n| Ok(Row::new(vec![Some(Value::Integer(n))], columns.clone())) as CResult<Row>);
    let mut cursor = RowCursor::streaming(rows);

    let mut seen = 0;
    while let Some(row) = cursor.advance().unwrap() {
        let _ = row.at(0).unwrap();
        seen += 1;
    }
    assert_eq!(seen, 1000);
    assert!(cursor.row_at(0).is_err(), "streaming cursor must not support random access");
}
