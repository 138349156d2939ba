use common::value::Value;
use core_db::{InsertQuery, Resultset, SelectQuery, Session, SqlRenderable, UpdateQuery};
use sqlite_driver::SqliteSession;

fn session_with_table() -> SqliteSession {
    let mut session = SqliteSession::open_in_memory().expect("open in-memory sqlite");
    session
        .execute("CREATE TABLE users(id INTEGER PRIMARY KEY, first_name TEXT, last_name TEXT)")
        .expect("create table");
    session
}

#[test]
fn insert_query_executes_and_select_query_reads_it_back() {
    let mut session = session_with_table();

    let insert = InsertQuery::new("users")
        .value("first_name", Value::Text("Alice".into()))
        .unwrap()
        .value("last_name", Value::Text("Smith".into()))
        .unwrap();
    insert.execute(&mut session).unwrap();

    let select = SelectQuery::new("users")
        .columns(["first_name", "last_name"])
        .where_clause("first_name = ?", vec![Value::Text("Alice".into())])
        .unwrap();
    let mut resultset = select.execute(&mut session).unwrap();

    let row = resultset.next().unwrap().expect("one matching row");
    assert_eq!(row.by_name("last_name").unwrap().unwrap().to_text().unwrap(), "Smith");
}

#[test]
fn update_query_renders_set_and_where_in_order() {
    let update = UpdateQuery::new("users")
        .set("last_name", Value::Text("Jones".into()))
        .unwrap()
        .where_clause("id = ?", vec![Value::Integer(1)])
        .unwrap();

    assert_eq!(update.to_sql().unwrap(), "UPDATE users SET last_name = ? WHERE id = ?");
}
