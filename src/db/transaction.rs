//! Nested transaction bookkeeping.
//!
//! Only the outermost level is a real database transaction. Inner levels are
//! emulated with savepoints named `trans_<depth>`, so a partial rollback undoes
//! just the work done since the matching `begin`.
//!
//! Planning is pure: callers run the SQL of the returned [`TransactionStep`] and
//! then call [`TransactionCoordinator::apply`]. A failed statement leaves the
//! depth untouched.

use crate::error::{DbError, DbResult};

/// Native statement (if any) required by one transaction operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStep {
    /// Start the outermost transaction.
    Begin,
    /// Open a savepoint for a nested level.
    Savepoint(u32),
    /// Commit the outermost transaction.
    Commit,
    /// Leave a nested level; its work is kept until the outer commit.
    CommitNested,
    /// Roll back the outermost transaction.
    Rollback,
    /// Undo everything since the given savepoint.
    RollbackTo(u32),
}

impl TransactionStep {
    /// SQL for this step, `None` for pure bookkeeping.
    pub fn sql(&self) -> Option<String> {
        match self {
            Self::Begin => Some("BEGIN".to_string()),
            Self::Savepoint(n) => Some(format!("SAVEPOINT {}", savepoint_name(*n))),
            Self::Commit => Some("COMMIT".to_string()),
            Self::CommitNested => None,
            Self::Rollback => Some("ROLLBACK".to_string()),
            Self::RollbackTo(n) => Some(format!("ROLLBACK TO SAVEPOINT {}", savepoint_name(*n))),
        }
    }

    /// Whether the step touches the outermost transaction.
    pub fn is_outermost(&self) -> bool {
        matches!(self, Self::Begin | Self::Commit | Self::Rollback)
    }
}

/// Savepoint identifier for a nesting level.
pub fn savepoint_name(level: u32) -> String {
    format!("trans_{level}")
}

/// Per-connection transaction depth.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionCoordinator {
    depth: u32,
}

impl TransactionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current nesting depth; 0 means no transaction is open.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    pub fn plan_begin(&self) -> TransactionStep {
        if self.depth == 0 {
            TransactionStep::Begin
        } else {
            TransactionStep::Savepoint(self.depth)
        }
    }

    pub fn plan_commit(&self) -> DbResult<TransactionStep> {
        match self.depth {
            0 => Err(DbError::state("commit", 0)),
            1 => Ok(TransactionStep::Commit),
            _ => Ok(TransactionStep::CommitNested),
        }
    }

    pub fn plan_rollback(&self) -> DbResult<TransactionStep> {
        match self.depth {
            0 => Err(DbError::state("rollback", 0)),
            1 => Ok(TransactionStep::Rollback),
            n => Ok(TransactionStep::RollbackTo(n - 1)),
        }
    }

    /// Record a step whose statement has succeeded.
    pub fn apply(&mut self, step: &TransactionStep) {
        match step {
            TransactionStep::Begin | TransactionStep::Savepoint(_) => self.depth += 1,
            TransactionStep::Commit
            | TransactionStep::CommitNested
            | TransactionStep::Rollback
            | TransactionStep::RollbackTo(_) => self.depth = self.depth.saturating_sub(1),
        }
    }

    /// Forget all open levels, e.g. after the handle was replaced.
    pub fn reset(&mut self) -> u32 {
        std::mem::take(&mut self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn begin(tx: &mut TransactionCoordinator) -> TransactionStep {
        let step = tx.plan_begin();
        tx.apply(&step);
        step
    }

    #[test]
    fn test_begin_nests_with_savepoints() {
        let mut tx = TransactionCoordinator::new();
        assert_eq!(begin(&mut tx), TransactionStep::Begin);
        assert_eq!(begin(&mut tx), TransactionStep::Savepoint(1));
        assert_eq!(begin(&mut tx), TransactionStep::Savepoint(2));
        assert_eq!(tx.depth(), 3);
        assert_eq!(
            TransactionStep::Savepoint(2).sql().as_deref(),
            Some("SAVEPOINT trans_2")
        );
    }

    #[test]
    fn test_commit_only_outermost_issues_sql() {
        let mut tx = TransactionCoordinator::new();
        for _ in 0..3 {
            begin(&mut tx);
        }

        let mut statements = Vec::new();
        while tx.in_transaction() {
            let step = tx.plan_commit().unwrap();
            statements.extend(step.sql());
            tx.apply(&step);
        }
        assert_eq!(statements, vec!["COMMIT".to_string()]);
    }

    #[test]
    fn test_rollback_targets_matching_savepoint() {
        let mut tx = TransactionCoordinator::new();
        for _ in 0..3 {
            begin(&mut tx);
        }

        let step = tx.plan_rollback().unwrap();
        assert_eq!(
            step.sql().as_deref(),
            Some("ROLLBACK TO SAVEPOINT trans_2")
        );
        tx.apply(&step);
        assert_eq!(tx.depth(), 2);

        let step = tx.plan_rollback().unwrap();
        assert_eq!(step, TransactionStep::RollbackTo(1));
        tx.apply(&step);

        let step = tx.plan_rollback().unwrap();
        assert_eq!(step.sql().as_deref(), Some("ROLLBACK"));
        tx.apply(&step);
        assert_eq!(tx.depth(), 0);
    }

    #[test]
    fn test_commit_and_rollback_at_depth_zero() {
        let tx = TransactionCoordinator::new();
        assert!(matches!(
            tx.plan_commit(),
            Err(DbError::State { depth: 0, .. })
        ));
        assert!(matches!(
            tx.plan_rollback(),
            Err(DbError::State { depth: 0, .. })
        ));
    }

    #[test]
    fn test_planning_does_not_change_depth() {
        let mut tx = TransactionCoordinator::new();
        let _ = tx.plan_begin();
        assert_eq!(tx.depth(), 0);
        begin(&mut tx);
        let _ = tx.plan_commit();
        assert_eq!(tx.depth(), 1);
        assert_eq!(tx.reset(), 1);
        assert_eq!(tx.depth(), 0);
    }
}
