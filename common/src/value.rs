use std::fmt;

use chrono::Timelike;

use crate::err::ReError;

/// GMT/UTC format strings the original uses for `strftime`, kept verbatim.
const FMT_DATE: &str = "%Y-%m-%d";
const FMT_TIME: &str = "%H:%M:%S";
const FMT_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// The subformat a `SqlTime` renders as. `Timestamp` and `DateTime` share
/// one wire representation, mirroring `sql_time::to_string()`'s original
/// `switch` which falls both cases into the same `strftime` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    Date,
    Time,
    Timestamp,
    DateTime,
}

/// Backend-neutral temporal value: epoch seconds (signed, so dates before
/// 1970 are representable, matching `time_t`) plus a rendering subformat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTime {
    pub value: i64,
    pub format: TimeFormat,
}

impl SqlTime {
    pub fn new(value: i64, format: TimeFormat) -> Self {
        SqlTime { value, format }
    }

    pub fn from_epoch(value: i64) -> Self {
        SqlTime { value, format: TimeFormat::Timestamp }
    }

    /// Exhaustive over all four formats — the original `switch` had no
    /// `default` arm and no trailing `return`, a latent UB; this match
    /// closes that gap while keeping `Timestamp`/`DateTime` sharing one
    /// format string as the original does.
    pub fn to_string_utc(&self) -> String {
        let naive = chrono::DateTime::<chrono::Utc>::from_timestamp(self.value, 0)
            .unwrap_or_else(|| chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap());

        match self.format {
            TimeFormat::Date => naive.format(FMT_DATE).to_string(),
            TimeFormat::Time => naive.format(FMT_TIME).to_string(),
            TimeFormat::Timestamp | TimeFormat::DateTime => {
                naive.format(FMT_TIMESTAMP).to_string()
            }
        }
    }

    /// Parses a textual time following the original's fallback chain:
    /// full timestamp, then date-only, then time-only, then a bare integer
    /// second count. Returns epoch 0 if nothing matches (the original's
    /// `parse_time` swallows all failures and returns 0).
    pub fn parse(text: &str) -> SqlTime {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(text, FMT_TIMESTAMP) {
            return SqlTime::new(dt.and_utc().timestamp(), TimeFormat::Timestamp);
        }
        if let Ok(date) = chrono::NaiveDate::parse_from_str(text, FMT_DATE) {
            let dt = date.and_hms_opt(0, 0, 0).unwrap();
            return SqlTime::new(dt.and_utc().timestamp(), TimeFormat::Date);
        }
        if let Ok(time) = chrono::NaiveTime::parse_from_str(text, FMT_TIME) {
            let seconds = time.num_seconds_from_midnight() as i64;
            return SqlTime::new(seconds, TimeFormat::Time);
        }
        if let Ok(seconds) = text.parse::<i64>() {
            return SqlTime::new(seconds, TimeFormat::Timestamp);
        }
        SqlTime::new(0, TimeFormat::Timestamp)
    }
}

impl fmt::Display for SqlTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_utc())
    }
}

/// Tagged variant covering every SQL-domain cell value in backend-neutral
/// form (C1). Replaces `rj::db::sql_value`'s `boost::variant`-ish wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Unsigned(u64),
    Real(f64),
    Text(String),
    WideText(String),
    Blob(Vec<u8>),
    Bool(bool),
    Time(SqlTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Unsigned(_) | Value::Real(_) | Value::Bool(_))
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Integer(_) => "Integer",
            Value::Unsigned(_) => "Unsigned",
            Value::Real(_) => "Real",
            Value::Text(_) => "Text",
            Value::WideText(_) => "WideText",
            Value::Blob(_) => "Blob",
            Value::Bool(_) => "Bool",
            Value::Time(_) => "Time",
        }
    }

    fn conversion_error(&self, to: &'static str) -> ReError {
        ReError::IllegalConversion { from: self.type_name(), to }
    }

    /// Coerce to a signed integer per the policy table in §4.1: Null/Blob
    /// fail, Real truncates, Text parses (or fails), Bool/Time map to 0/1
    /// and epoch seconds respectively.
    pub fn to_integer(&self) -> Result<i64, ReError> {
        match self {
            Value::Integer(v) => Ok(*v),
            Value::Unsigned(v) => Ok(*v as i64),
            Value::Real(v) => Ok(*v as i64),
            Value::Text(s) | Value::WideText(s) => {
                s.trim().parse::<i64>().map_err(|_| self.conversion_error("Int"))
            }
            Value::Bool(b) => Ok(if *b { 1 } else { 0 }),
            Value::Time(t) => Ok(t.value),
            Value::Null | Value::Blob(_) => Err(self.conversion_error("Int")),
        }
    }

    /// Coerce to a floating-point real. Null/Blob/Time fail per the table.
    pub fn to_real(&self) -> Result<f64, ReError> {
        match self {
            Value::Integer(v) => Ok(*v as f64),
            Value::Unsigned(v) => Ok(*v as f64),
            Value::Real(v) => Ok(*v),
            Value::Text(s) | Value::WideText(s) => {
                s.trim().parse::<f64>().map_err(|_| self.conversion_error("Real"))
            }
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Null | Value::Blob(_) | Value::Time(_) => Err(self.conversion_error("Real")),
        }
    }

    /// Coerce to text. Always succeeds except for `Blob`, which has no
    /// general textual representation in the policy table.
    pub fn to_text(&self) -> Result<String, ReError> {
        match self {
            Value::Null => Ok("NULL".to_string()),
            Value::Integer(v) => Ok(v.to_string()),
            Value::Unsigned(v) => Ok(v.to_string()),
            Value::Real(v) => Ok(format_g(*v)),
            Value::Text(s) | Value::WideText(s) => Ok(s.clone()),
            Value::Bool(b) => Ok(if *b { "1".to_string() } else { "0".to_string() }),
            Value::Time(t) => Ok(t.to_string_utc()),
            Value::Blob(_) => Err(self.conversion_error("Text")),
        }
    }

    /// Coerce to raw bytes. Only `Blob` and `Text` (utf8 bytes) succeed.
    pub fn to_blob(&self) -> Result<Vec<u8>, ReError> {
        match self {
            Value::Blob(b) => Ok(b.clone()),
            Value::Text(s) | Value::WideText(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(self.conversion_error("Blob")),
        }
    }

    /// Coerce to boolean. Numeric kinds compare against zero; Text accepts
    /// only the canonical "true"/"1"/"false"/"0" spellings.
    pub fn to_bool(&self) -> Result<bool, ReError> {
        match self {
            Value::Integer(v) => Ok(*v != 0),
            Value::Unsigned(v) => Ok(*v != 0),
            Value::Real(v) => Ok(*v != 0.0),
            Value::Bool(b) => Ok(*b),
            Value::Time(t) => Ok(t.value > 0),
            Value::Text(s) | Value::WideText(s) => match s.as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(self.conversion_error("Bool")),
            },
            Value::Null | Value::Blob(_) => Err(self.conversion_error("Bool")),
        }
    }

    /// Coerce to a temporal value. Text runs the parse fallback chain
    /// (`SqlTime::parse`); numeric kinds become epoch seconds; Blob fails.
    pub fn to_time(&self) -> Result<SqlTime, ReError> {
        match self {
            Value::Time(t) => Ok(*t),
            Value::Integer(v) => Ok(SqlTime::from_epoch(*v)),
            Value::Unsigned(v) => Ok(SqlTime::from_epoch(*v as i64)),
            Value::Bool(b) => Ok(SqlTime::from_epoch(if *b { 1 } else { 0 })),
            Value::Text(s) | Value::WideText(s) => Ok(SqlTime::parse(s)),
            Value::Null => Ok(SqlTime::from_epoch(0)),
            Value::Real(_) | Value::Blob(_) => Err(self.conversion_error("Time")),
        }
    }
}

/// `%g`-style shortest round-trippable float rendering, used for
/// `Value::Real -> Text` conversion (the original's `sprintf("%g", ...)`).
fn format_g(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Ok(text) => write!(f, "{text}"),
            Err(_) => write!(f, "<blob {} bytes>", self.to_blob().map(|b| b.len()).unwrap_or(0)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Unsigned(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<SqlTime> for Value {
    fn from(v: SqlTime) -> Self {
        Value::Time(v)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn integer_round_trips_through_text() {
        let v = Value::Integer(42);
        assert_eq!(v.to_text().unwrap(), "42");
    }

    #[test]
    fn blob_has_no_text_form() {
        let v = Value::Blob(vec![1, 2, 3]);
        assert!(matches!(v.to_text(), Err(ReError::IllegalConversion { from: "Blob", to: "Text" })));
    }

    #[test]
    fn bool_text_accepts_only_canonical_spellings() {
        assert_eq!(Value::Text("true".into()).to_bool().unwrap(), true);
        assert_eq!(Value::Text("0".into()).to_bool().unwrap(), false);
        assert!(Value::Text("Bryan".into()).to_bool().is_err());
    }

    #[test]
    fn illegal_conversion_on_non_numeric_text() {
        let v = Value::Text("Bryan".to_string());
        assert!(v.to_real().is_err());
    }

    #[test]
    fn null_equals_only_null() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Integer(0));
    }

    #[test]
    fn time_formats_pick_the_right_strftime_pattern() {
        let t = SqlTime::new(0, TimeFormat::Date);
        assert_eq!(t.to_string_utc(), "1970-01-01");

        let t = SqlTime::new(3661, TimeFormat::Time);
        assert_eq!(t.to_string_utc(), "01:01:01");

        let t = SqlTime::new(0, TimeFormat::Timestamp);
        assert_eq!(t.to_string_utc(), "1970-01-01 00:00:00");
    }

    #[test]
    fn time_parse_falls_back_through_formats() {
        let t = SqlTime::parse("2024-01-02 03:04:05");
        assert_eq!(t.format, TimeFormat::Timestamp);

        let t = SqlTime::parse("2024-01-02");
        assert_eq!(t.format, TimeFormat::Date);

        let t = SqlTime::parse("86400");
        assert_eq!(t.value, 86400);
    }
}
