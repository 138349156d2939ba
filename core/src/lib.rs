pub mod bindable;
pub mod paramstyle;
pub mod query;
pub mod registry;
pub mod resultset;
pub mod session;
pub mod statement;
pub mod transaction;
pub mod uri;

pub use common::column::{ColumnCategory, ColumnDefinition};
pub use common::err::{CResult, ReError};
pub use common::row::Row;
pub use common::value::{SqlTime, TimeFormat, Value};

pub use bindable::Bindable;
pub use query::{DeleteQuery, InsertQuery, JoinKind, JoinSpec, SelectQuery, SqlRenderable, UpdateQuery, WhereClause};
pub use registry::{create_session, register, DriverFactory};
pub use resultset::{Resultset, RowCursor};
pub use session::{Capabilities, InFlightGuard, Session, SessionOptions};
pub use statement::{Statement, StatementState};
pub use transaction::{AccessMode, Isolation, Transaction, TransactionGuard, TransactionState};
pub use uri::Uri;
