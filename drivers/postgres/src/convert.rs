use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use common::column::ColumnCategory;
use common::value::{SqlTime, TimeFormat, Value};
use postgres::types::{FromSql, IsNull, ToSql, Type};
use postgres::Row;

/// Maps one cell of a `postgres::Row` into a backend-neutral `Value`,
/// grounded in `original_source/src/postgres/binding.cpp`'s
/// `data_mapper::to_value(Oid, ...)` switch: the Oid dispatch there becomes
/// a match over `postgres::types::Type` here, since the `postgres` crate
/// already decodes the wire format for the types it knows about.
pub fn value_at(row: &Row, index: usize) -> Value {
    let column = &row.columns()[index];
    match *column.type_() {
        Type::BOOL => get::<bool>(row, index).map(Value::Bool).unwrap_or(Value::Null),
        Type::INT2 => get::<i16>(row, index).map(|v| Value::Integer(v as i64)).unwrap_or(Value::Null),
        Type::INT4 => get::<i32>(row, index).map(|v| Value::Integer(v as i64)).unwrap_or(Value::Null),
        Type::INT8 => get::<i64>(row, index).map(Value::Integer).unwrap_or(Value::Null),
        Type::FLOAT4 => get::<f32>(row, index).map(|v| Value::Real(v as f64)).unwrap_or(Value::Null),
        Type::FLOAT8 => get::<f64>(row, index).map(Value::Real).unwrap_or(Value::Null),
        Type::BYTEA => get::<Vec<u8>>(row, index).map(Value::Blob).unwrap_or(Value::Null),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, index)
            .map(|v| Value::Time(SqlTime::new(v.and_utc().timestamp(), TimeFormat::DateTime)))
            .unwrap_or(Value::Null),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, index)
            .map(|v| Value::Time(SqlTime::new(v.timestamp(), TimeFormat::Timestamp)))
            .unwrap_or(Value::Null),
        Type::DATE => get::<NaiveDate>(row, index)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|v| Value::Time(SqlTime::new(v.and_utc().timestamp(), TimeFormat::Date)))
            .unwrap_or(Value::Null),
        Type::TIME => get::<NaiveTime>(row, index)
            .map(|t: NaiveTime| Value::Time(SqlTime::new(t.num_seconds_from_midnight() as i64, TimeFormat::Time)))
            .unwrap_or(Value::Null),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, index).map(Value::Text).unwrap_or(Value::Null)
        }
        _ => get::<String>(row, index).map(Value::Text).unwrap_or(Value::Null),
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, index: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(index).ok().flatten()
}

/// Neutral category for a `postgres::types::Type`, used for
/// `ColumnDefinition::category`.
pub fn category_of(ty: &Type) -> ColumnCategory {
    match *ty {
        Type::INT2 | Type::INT4 | Type::INT8 => ColumnCategory::Integer,
        Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => ColumnCategory::Real,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => ColumnCategory::Text,
        Type::BYTEA => ColumnCategory::Blob,
        Type::TIMESTAMP | Type::TIMESTAMPTZ | Type::DATE | Type::TIME => ColumnCategory::Temporal,
        Type::BOOL => ColumnCategory::Integer,
        _ => ColumnCategory::Unknown,
    }
}

/// Wraps an owned `Value` so it can be passed as `&dyn ToSql` when binding
/// query parameters; the binding counterpart to `value_at` above. Accepts
/// any requested type and lets the wire encoder for the chosen Rust type
/// perform the actual conversion, mirroring `binding::bind()`'s overload set
/// in the original, which picked an Oid from the bound C++ type rather than
/// from column metadata.
pub struct PgValue(pub Value);

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match &self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(i) => i.to_sql(ty, out),
            Value::Unsigned(u) => (*u as i64).to_sql(ty, out),
            Value::Real(r) => r.to_sql(ty, out),
            Value::Text(s) | Value::WideText(s) => s.to_sql(ty, out),
            Value::Blob(b) => b.to_sql(ty, out),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Time(t) => t.to_string_utc().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    postgres::types::to_sql_checked!();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integer_and_text_types_map_to_expected_categories() {
        assert_eq!(category_of(&Type::INT8), ColumnCategory::Integer);
        assert_eq!(category_of(&Type::VARCHAR), ColumnCategory::Text);
        assert_eq!(category_of(&Type::TIMESTAMPTZ), ColumnCategory::Temporal);
        assert_eq!(category_of(&Type::BYTEA), ColumnCategory::Blob);
    }
}
