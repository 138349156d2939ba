use common::column::ColumnCategory;
use common::value::{SqlTime, TimeFormat, Value};
use mysql::consts::ColumnType;
use mysql::{Column, Value as MyValue};

/// Maps one decoded `mysql::Value` cell into backend-neutral `Value`,
/// grounded in `original_source/src/mysql/resultset.cpp`'s row-to-value
/// walk: `MYSQL_TYPE_*` dispatch collapses here to a match over the already
/// decoded `mysql::Value` variant rather than raw wire bytes, since the
/// `mysql` crate does that decoding for us.
pub fn from_mysql(value: MyValue, column_type: ColumnType) -> Value {
    match value {
        MyValue::NULL => Value::Null,
        MyValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => {
                if is_temporal(column_type) {
                    Value::Time(reparse_as(&text, format_for(column_type)))
                } else {
                    Value::Text(text)
                }
            }
            Err(err) => Value::Blob(err.into_bytes()),
        },
        MyValue::Int(i) => Value::Integer(i),
        MyValue::UInt(u) => Value::Unsigned(u),
        MyValue::Float(f) => Value::Real(f as f64),
        MyValue::Double(d) => Value::Real(d),
        MyValue::Date(year, month, day, hour, min, sec, micro) => {
            let text = format!("{year:04}-{month:02}-{day:02} {hour:02}:{min:02}:{sec:02}.{micro:06}");
            Value::Time(reparse_as(&text, TimeFormat::DateTime))
        }
        MyValue::Time(negative, days, hour, min, sec, micro) => {
            let seconds = (days as i64) * 86_400
                + (hour as i64) * 3_600
                + (min as i64) * 60
                + sec as i64
                + if micro > 0 { 1 } else { 0 };
            let seconds = if negative { -seconds } else { seconds };
            Value::Time(SqlTime::new(seconds, TimeFormat::Time))
        }
    }
}

fn is_temporal(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_NEWDATE
            | ColumnType::MYSQL_TYPE_TIME
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP
    )
}

fn format_for(column_type: ColumnType) -> TimeFormat {
    match column_type {
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => TimeFormat::Date,
        ColumnType::MYSQL_TYPE_TIME => TimeFormat::Time,
        ColumnType::MYSQL_TYPE_TIMESTAMP => TimeFormat::Timestamp,
        _ => TimeFormat::DateTime,
    }
}

fn reparse_as(text: &str, format: TimeFormat) -> SqlTime {
    let mut time = SqlTime::parse(text);
    time.format = format;
    time
}

/// Neutral category for a `mysql::consts::ColumnType`, used for
/// `ColumnDefinition::category` regardless of the raw wire type tag, which
/// is kept as-is in `ColumnDefinition::sql_type`.
pub fn category_of(column_type: ColumnType) -> ColumnCategory {
    use ColumnType::*;
    match column_type {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_INT24
        | MYSQL_TYPE_YEAR => ColumnCategory::Integer,
        MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE | MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => ColumnCategory::Real,
        MYSQL_TYPE_VARCHAR | MYSQL_TYPE_VAR_STRING | MYSQL_TYPE_STRING | MYSQL_TYPE_ENUM | MYSQL_TYPE_SET
        | MYSQL_TYPE_JSON => ColumnCategory::Text,
        MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB | MYSQL_TYPE_BLOB
        | MYSQL_TYPE_GEOMETRY | MYSQL_TYPE_BIT => ColumnCategory::Blob,
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE | MYSQL_TYPE_TIME | MYSQL_TYPE_DATETIME | MYSQL_TYPE_TIMESTAMP => {
            ColumnCategory::Temporal
        }
        MYSQL_TYPE_NULL => ColumnCategory::Unknown,
        _ => ColumnCategory::Unknown,
    }
}

pub fn nullable(column: &Column) -> bool {
    !column.flags().contains(mysql::consts::ColumnFlags::NOT_NULL_FLAG)
}

/// Converts an owned `Value` into the `mysql` crate's dynamic wire value,
/// the binding counterpart to `from_mysql` above.
pub fn to_mysql(value: &Value) -> MyValue {
    match value {
        Value::Null => MyValue::NULL,
        Value::Integer(i) => MyValue::Int(*i),
        Value::Unsigned(u) => MyValue::UInt(*u),
        Value::Real(r) => MyValue::Double(*r),
        Value::Text(s) | Value::WideText(s) => MyValue::Bytes(s.as_bytes().to_vec()),
        Value::Blob(b) => MyValue::Bytes(b.clone()),
        Value::Bool(b) => MyValue::Int(if *b { 1 } else { 0 }),
        Value::Time(t) => MyValue::Bytes(t.to_string_utc().into_bytes()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integer_column_types_map_to_integer_category() {
        assert_eq!(category_of(ColumnType::MYSQL_TYPE_LONGLONG), ColumnCategory::Integer);
        assert_eq!(category_of(ColumnType::MYSQL_TYPE_VAR_STRING), ColumnCategory::Text);
        assert_eq!(category_of(ColumnType::MYSQL_TYPE_DATETIME), ColumnCategory::Temporal);
    }

    #[test]
    fn null_round_trips() {
        assert_eq!(from_mysql(MyValue::NULL, ColumnType::MYSQL_TYPE_LONG), Value::Null);
        assert!(matches!(to_mysql(&Value::Null), MyValue::NULL));
    }

    #[test]
    fn text_column_declared_as_datetime_reparses_into_time() {
        let v = from_mysql(
            MyValue::Bytes(b"2024-01-02 03:04:05".to_vec()),
            ColumnType::MYSQL_TYPE_DATETIME,
        );
        assert!(matches!(v, Value::Time(t) if t.format == TimeFormat::DateTime));
    }
}
