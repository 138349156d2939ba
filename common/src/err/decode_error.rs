use std::fmt::Display;
use std::{fmt, io};
use std::str::Utf8Error;

/// The single error enumeration for the access layer.
///
/// Mirrors `rj::db`'s exception taxonomy (`database_exception` and its
/// subclasses) as a tagged union instead of a class hierarchy.
#[derive(Debug)]
pub enum ReError {
    //////////////////////
    // SQL domain
    //////////////////////
    /// root of the SQL-domain taxonomy: backend text plus optional context
    /// (usually the offending SQL).
    DatabaseException(String, Option<String>),

    /// column lookup by name missed.
    NoSuchColumn(String),

    /// dereferencing an exhausted resultset iterator.
    RecordNotFound,

    /// bad bind index, incompatible type, or parameter rewrite failure.
    BindingError(String),

    /// illegal transaction transition, or the backend refused start/commit.
    TransactionException(String),

    /// an ORM-adjacent hook required a primary key the schema doesn't have.
    NoPrimaryKey,

    /// `Value` coercion failed.
    IllegalConversion { from: &'static str, to: &'static str },

    /// `create_session` was given a URI with no registered scheme.
    UnknownScheme(String),

    /// the backend refused the connection; wraps its native diagnostic.
    ConnectionRefused(String),

    /// the backend has no native or rewritten form for the requested
    /// binding style (e.g. named params against a driver without enhanced
    /// parameter mapping).
    UnsupportedBindingStyle(String),

    /// a query builder was executed while invalid (missing table, column
    /// count mismatch, empty WHERE, ...).
    InvalidQuery(String),

    /// more than one statement tried to use a `Session` at once.
    ConcurrentUse,

    /// an optional capability (e.g. savepoints) the backend doesn't have.
    Unsupported(&'static str),

    //////////////////////
    // Ambient
    //////////////////////
    IoError(io::Error),
    Utf8Error(Utf8Error),

    /// the session/driver configuration (TOML, URI query string) couldn't
    /// be parsed.
    ConfigParseErr(String),
}

impl Display for ReError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> fmt::Result {
        match self {
            ReError::DatabaseException(what, Some(ctx)) => write!(f, "{what} ({ctx})"),
            ReError::DatabaseException(what, None) => write!(f, "{what}"),
            ReError::NoSuchColumn(name) => write!(f, "no such column: {name}"),
            ReError::RecordNotFound => write!(f, "record not found"),
            ReError::BindingError(msg) => write!(f, "binding error: {msg}"),
            ReError::TransactionException(msg) => write!(f, "transaction error: {msg}"),
            ReError::NoPrimaryKey => write!(f, "no primary key"),
            ReError::IllegalConversion { from, to } => {
                write!(f, "cannot convert {from} to {to}")
            }
            ReError::UnknownScheme(scheme) => write!(f, "unknown uri scheme: {scheme}"),
            ReError::ConnectionRefused(msg) => write!(f, "connection refused: {msg}"),
            ReError::UnsupportedBindingStyle(msg) => {
                write!(f, "unsupported binding style: {msg}")
            }
            ReError::InvalidQuery(msg) => write!(f, "invalid query: {msg}"),
            ReError::ConcurrentUse => write!(f, "session already has an in-flight statement"),
            ReError::Unsupported(what) => write!(f, "unsupported: {what}"),
            ReError::IoError(err) => write!(f, "{}", err),
            ReError::Utf8Error(err) => write!(f, "{}", err),
            ReError::ConfigParseErr(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ReError {}

impl From<io::Error> for ReError {
    fn from(error: io::Error) -> Self {
        ReError::IoError(error)
    }
}

impl From<Utf8Error> for ReError {
    fn from(error: Utf8Error) -> Self {
        ReError::Utf8Error(error)
    }
}

impl ReError {
    pub fn database<S: Into<String>>(what: S) -> Self {
        ReError::DatabaseException(what.into(), None)
    }

    pub fn database_with_context<S: Into<String>, C: Into<String>>(what: S, context: C) -> Self {
        ReError::DatabaseException(what.into(), Some(context.into()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn database_exception_formats_with_and_without_context() {
        let plain = ReError::database("syntax error");
        assert_eq!(plain.to_string(), "syntax error");

        let with_ctx = ReError::database_with_context("syntax error", "SELECT * FROM");
        assert_eq!(with_ctx.to_string(), "syntax error (SELECT * FROM)");
    }

    #[test]
    fn illegal_conversion_names_both_sides() {
        let err = ReError::IllegalConversion { from: "Text", to: "Real" };
        assert_eq!(err.to_string(), "cannot convert Text to Real");
    }
}
