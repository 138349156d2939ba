use common::err::CResult;

use crate::bindable::Bindable;
use crate::resultset::Resultset;

/// Lifecycle states a Statement moves through (C4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// constructed, not yet sent to the backend for preparation.
    Fresh,
    /// backend has compiled the SQL template; bindings may be applied.
    Prepared,
    /// `execute()` has been called at least once since the last reset.
    Executed,
    /// the associated Resultset has been fully consumed.
    Exhausted,
    /// the backend reported a failure; the Statement cannot be reused
    /// until `reset()`.
    Errored,
    /// `close()` was called; no further operations are permitted.
    Closed,
}

/// Holds an immutable SQL template, a parameter map, a binding style, an
/// opaque backend-owned compiled handle, and an execution state (C4).
///
/// Driver crates supply the concrete type; callers interact only through
/// this trait plus `Bindable`.
pub trait Statement: Bindable {
    fn state(&self) -> StatementState;

    /// Prepares the statement against the backend if not already prepared.
    fn prepare(&mut self) -> CResult<()>;

    /// Executes the prepared statement with its current bindings,
    /// returning a Resultset. Implicitly prepares if still `Fresh`.
    fn execute(&mut self) -> CResult<Box<dyn Resultset>>;

    /// Returns to `Prepared`, preserving bindings: if the backend cannot
    /// natively preserve bound values across a reset, the Statement must
    /// re-apply its cached Values transparently.
    fn reset(&mut self) -> CResult<()>;

    /// Releases backend resources; idempotent.
    fn close(&mut self) -> CResult<()>;

    /// The original SQL text this Statement was constructed from.
    fn sql(&self) -> &str;
}
