use common::err::{CResult, ReError};

/// SQL isolation level (C7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Access mode; `deferrable` is only meaningful when paired with
/// `Serializable` + `ReadOnly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    None,
    ReadOnly,
    ReadWrite,
}

/// Lifecycle states a Transaction moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Inactive,
    Active,
    Committed,
    RolledBack,
}

/// Carries isolation, access-mode, deferrable flag and state; bound to a
/// Session that must resolve it (commit or rollback) before closing (C7).
pub trait Transaction {
    fn state(&self) -> TransactionState;
    fn isolation(&self) -> Isolation;
    fn access_mode(&self) -> AccessMode;
    fn deferrable(&self) -> bool;

    /// Assembles and sends the backend's `START TRANSACTION` (or `BEGIN`)
    /// text per the current isolation/access-mode/deferrable settings, and
    /// moves to `Active`. `TransactionException` if already Active or
    /// resolved.
    fn start(&mut self) -> CResult<()>;

    fn commit(&mut self) -> CResult<()>;
    fn rollback(&mut self) -> CResult<()>;

    /// Queries the backend for whether a transaction is currently open on
    /// the connection, rather than trusting local `state()` — the backend
    /// may have auto-rolled-back on an intervening error (spec.md §4.7).
    /// Default falls back to local state for backends with no cheaper
    /// native check.
    fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Establishes a named savepoint within the current transaction.
    /// Optional capability — backends without native savepoints reject
    /// with `Unsupported`.
    fn savepoint(&mut self, name: &str) -> CResult<()> {
        let _ = name;
        Err(ReError::Unsupported("savepoints"))
    }

    /// Releases (forgets) a previously established savepoint.
    fn release(&mut self, name: &str) -> CResult<()> {
        let _ = name;
        Err(ReError::Unsupported("savepoints"))
    }

    /// Rolls back to a previously established savepoint, keeping the
    /// enclosing transaction active.
    fn rollback_to(&mut self, name: &str) -> CResult<()> {
        let _ = name;
        Err(ReError::Unsupported("savepoints"))
    }
}

/// Assembles the `START TRANSACTION`/`BEGIN` SQL text for the given
/// settings, literally following `original_source/src/postgres/transaction.cpp`:
/// base token, then ` ISOLATION LEVEL ...`, then ` READ ONLY`/` READ WRITE`,
/// then ` DEFERRABLE` only when Serializable + ReadOnly. The original has a
/// "DEFERABLE" typo which this redesign does not reproduce.
pub fn build_start_sql(base: &str, isolation: Isolation, access_mode: AccessMode, deferrable: bool) -> String {
    let mut sql = base.to_string();

    match isolation {
        Isolation::None => {}
        Isolation::ReadUncommitted => sql.push_str(" ISOLATION LEVEL READ UNCOMMITTED"),
        Isolation::ReadCommitted => sql.push_str(" ISOLATION LEVEL READ COMMITTED"),
        Isolation::RepeatableRead => sql.push_str(" ISOLATION LEVEL REPEATABLE READ"),
        Isolation::Serializable => sql.push_str(" ISOLATION LEVEL SERIALIZABLE"),
    }

    match access_mode {
        AccessMode::None => {}
        AccessMode::ReadOnly => sql.push_str(" READ ONLY"),
        AccessMode::ReadWrite => sql.push_str(" READ WRITE"),
    }

    if isolation == Isolation::Serializable && access_mode == AccessMode::ReadOnly {
        sql.push_str(if deferrable { " DEFERRABLE" } else { " NOT DEFERRABLE" });
    }

    sql
}

/// Scope guard: rolls back on drop unless `mark_committed()` was called
/// first, so an early return or panic never leaves a transaction dangling.
pub struct TransactionGuard {
    transaction: Option<Box<dyn Transaction>>,
    committed: bool,
}

impl TransactionGuard {
    pub fn new(mut transaction: Box<dyn Transaction>) -> CResult<Self> {
        transaction.start()?;
        Ok(TransactionGuard { transaction: Some(transaction), committed: false })
    }

    pub fn commit(mut self) -> CResult<()> {
        let mut transaction = self.transaction.take().expect("transaction guard double-resolved");
        transaction.commit()?;
        self.committed = true;
        Ok(())
    }

    pub fn rollback(mut self) -> CResult<()> {
        let mut transaction = self.transaction.take().expect("transaction guard double-resolved");
        transaction.rollback()
    }

    pub fn transaction(&self) -> &dyn Transaction {
        self.transaction.as_deref().expect("transaction guard already resolved")
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Some(mut transaction) = self.transaction.take() {
            if transaction.state() == TransactionState::Active {
                let _ = transaction.rollback();
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn start_sql_assembles_isolation_and_access_mode() {
        let sql = build_start_sql("START TRANSACTION", Isolation::RepeatableRead, AccessMode::ReadWrite, false);
        assert_eq!(sql, "START TRANSACTION ISOLATION LEVEL REPEATABLE READ READ WRITE");
    }

    #[test]
    fn deferrable_only_applies_to_serializable_read_only() {
        let sql = build_start_sql("START TRANSACTION", Isolation::Serializable, AccessMode::ReadOnly, true);
        assert!(sql.ends_with(" DEFERRABLE") && !sql.ends_with("NOT DEFERRABLE"));

        let sql = build_start_sql("START TRANSACTION", Isolation::Serializable, AccessMode::ReadOnly, false);
        assert!(sql.ends_with(" NOT DEFERRABLE"));

        let sql = build_start_sql("START TRANSACTION", Isolation::Serializable, AccessMode::ReadWrite, true);
        assert!(!sql.contains("DEFERRABLE"));
    }

    #[test]
    fn sqlite_begin_with_no_isolation_or_mode_stays_bare() {
        let sql = build_start_sql("BEGIN", Isolation::None, AccessMode::None, false);
        assert_eq!(sql, "BEGIN");
    }

    struct FakeTransaction {
        state: TransactionState,
    }

    impl Transaction for FakeTransaction {
        fn state(&self) -> TransactionState {
            self.state
        }
        fn isolation(&self) -> Isolation {
            Isolation::None
        }
        fn access_mode(&self) -> AccessMode {
            AccessMode::None
        }
        fn deferrable(&self) -> bool {
            false
        }
        fn start(&mut self) -> CResult<()> {
            self.state = TransactionState::Active;
            Ok(())
        }
        fn commit(&mut self) -> CResult<()> {
            self.state = TransactionState::Committed;
            Ok(())
        }
        fn rollback(&mut self) -> CResult<()> {
            self.state = TransactionState::RolledBack;
            Ok(())
        }
    }

    #[test]
    fn guard_rolls_back_on_drop_unless_committed() {
        let guard = TransactionGuard::new(Box::new(FakeTransaction { state: TransactionState::Inactive })).unwrap();
        assert_eq!(guard.transaction().state(), TransactionState::Active);
        drop(guard);
    }

    #[test]
    fn guard_commit_consumes_and_skips_rollback() {
        let guard = TransactionGuard::new(Box::new(FakeTransaction { state: TransactionState::Inactive })).unwrap();
        guard.commit().unwrap();
    }
}
