mod convert;
mod session;
mod statement;

use std::sync::Arc;

use common::err::{CResult, ReError};
use core_db::registry::{self, DriverFactory};
use core_db::session::Session;
use core_db::uri::Uri;

pub use session::SqliteSession;
pub use statement::SqliteStatement;

/// Registers the `sqlite` and `file` schemes against the process-wide
/// driver registry. Idempotent — callers invoke this once at startup
/// (`sqlite_driver::register()`), mirroring the registry pattern the rest
/// of the workspace uses for schema/driver bootstrap.
pub fn register() {
    let factory: Arc<dyn DriverFactory> = Arc::new(SqliteFactory);
    registry::register("sqlite", factory.clone());
    registry::register("file", factory);
}

struct SqliteFactory;

impl DriverFactory for SqliteFactory {
    fn open(&self, uri: &Uri) -> CResult<Box<dyn Session>> {
        let path = resolve_path(uri);
        let session = if path == ":memory:" {
            SqliteSession::open_in_memory()
        } else {
            SqliteSession::open_file(&path)
        }
        .map_err(|e| ReError::ConnectionRefused(e.to_string()))?;

        Ok(Box::new(session))
    }
}

/// `sqlite://:memory:` or `sqlite:///abs/path.db` or `file:///abs/path.db`
/// all resolve to a filesystem path; an empty database segment means an
/// in-memory database.
fn resolve_path(uri: &Uri) -> String {
    if uri.database.is_empty() || uri.database == ":memory:" {
        return ":memory:".to_string();
    }
    if uri.database.starts_with('/') {
        uri.database.clone()
    } else {
        format!("/{}", uri.database)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn resolves_in_memory_when_database_segment_is_empty() {
        let uri = Uri::parse("sqlite://").unwrap();
        assert_eq!(resolve_path(&uri), ":memory:");
    }

    #[test]
    fn resolves_absolute_path() {
        let uri = Uri::parse("sqlite:///tmp/test.db").unwrap();
        assert_eq!(resolve_path(&uri), "/tmp/test.db");
    }
}
