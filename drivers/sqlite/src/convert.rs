use common::column::ColumnCategory;
use common::value::{SqlTime, TimeFormat, Value};
use rusqlite::types::ValueRef;

/// Maps a rusqlite cell (`ValueRef`, borrowed for the lifetime of the row)
/// into an owned `Value`. `declared_type` drives the Temporal special case:
/// SQLite has no native temporal type, so a column declared
/// `DATE`/`DATETIME`/`TIMESTAMP` storing TEXT is reparsed into `Value::Time`
/// rather than left as `Value::Text` — everything else maps structurally.
pub fn from_sqlite(value: ValueRef<'_>, declared_type: Option<&str>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match temporal_format(declared_type) {
                Some(format) => Value::Time(reparse_as(&text, format)),
                None => Value::Text(text),
            }
        }
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn temporal_format(declared_type: Option<&str>) -> Option<TimeFormat> {
    match declared_type.map(str::to_ascii_uppercase).as_deref() {
        Some("DATE") => Some(TimeFormat::Date),
        Some("TIME") => Some(TimeFormat::Time),
        Some("DATETIME") => Some(TimeFormat::DateTime),
        Some("TIMESTAMP") => Some(TimeFormat::Timestamp),
        _ => None,
    }
}

fn reparse_as(text: &str, format: TimeFormat) -> SqlTime {
    let mut time = SqlTime::parse(text);
    time.format = format;
    time
}

/// Neutral category for a SQLite declared type string (SQLite's own type
/// affinity rules: any declared type is accepted, but storage is dynamic).
pub fn category_of(declared_type: Option<&str>) -> ColumnCategory {
    let Some(ty) = declared_type else { return ColumnCategory::Unknown };
    let ty = ty.to_ascii_uppercase();

    if ty.contains("INT") {
        ColumnCategory::Integer
    } else if ty.contains("CHAR") || ty.contains("CLOB") || ty.contains("TEXT") {
        ColumnCategory::Text
    } else if ty.contains("BLOB") {
        ColumnCategory::Blob
    } else if ty.contains("REAL") || ty.contains("FLOA") || ty.contains("DOUB") {
        ColumnCategory::Real
    } else if ty.contains("BOOL") {
        ColumnCategory::Bool
    } else if ty.contains("DATE") || ty.contains("TIME") {
        ColumnCategory::Temporal
    } else {
        ColumnCategory::Unknown
    }
}

/// Converts an owned `Value` into rusqlite's dynamic `ToSql` representation
/// for binding into a prepared statement.
pub fn to_sqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Unsigned(u) => rusqlite::types::Value::Integer(*u as i64),
        Value::Real(r) => rusqlite::types::Value::Real(*r),
        Value::Text(s) | Value::WideText(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
        Value::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
        Value::Time(t) => rusqlite::types::Value::Text(t.to_string_utc()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn declared_date_type_reparses_text_into_time() {
        let v = from_sqlite(ValueRef::Text(b"2024-01-02"), Some("DATE"));
        assert!(matches!(v, Value::Time(t) if t.format == TimeFormat::Date));
    }

    #[test]
    fn plain_text_column_stays_text() {
        let v = from_sqlite(ValueRef::Text(b"hello"), Some("VARCHAR(255)"));
        assert_eq!(v, Value::Text("hello".to_string()));
    }

    #[test]
    fn category_mapping_covers_common_sqlite_type_affinities() {
        assert_eq!(category_of(Some("INTEGER")), ColumnCategory::Integer);
        assert_eq!(category_of(Some("VARCHAR(10)")), ColumnCategory::Text);
        assert_eq!(category_of(None), ColumnCategory::Unknown);
    }
}
