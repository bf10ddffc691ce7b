use crate::model::{ExecutionOutcome, QueryAttempt};

/// Pure decision logic for the generate/execute repair cycle. No I/O.
#[derive(Debug, Clone, Copy)]
pub struct RepairController {
    max_attempts: u32,
}

impl RepairController {
    pub fn new(max_attempts: u32) -> Self {
        // Zero attempts would mean never generating at all.
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Retry iff the outcome is a recoverable execution error and attempts
    /// remain. Non-recoverable kinds short-circuit even with budget left.
    pub fn should_retry(&self, outcome: &ExecutionOutcome, attempts_so_far: u32) -> bool {
        if attempts_so_far >= self.max_attempts {
            return false;
        }
        outcome
            .error_kind()
            .is_some_and(|kind| kind.is_recoverable())
    }

    /// Feedback seeded into the next generation call: the failing query
    /// plus the classified error message.
    pub fn build_feedback(&self, attempt: &QueryAttempt, outcome: &ExecutionOutcome) -> String {
        match outcome {
            ExecutionOutcome::Failure { kind, message } => format!(
                "Previous query failed.\nQuery: {}\nError ({}): {}\nFix the error and generate a corrected query.",
                attempt.query, kind, message
            ),
            ExecutionOutcome::Rows { .. } => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExecutionErrorKind;

    fn attempt(query: &str) -> QueryAttempt {
        QueryAttempt {
            query: query.to_string(),
            attempt: 1,
            feedback: None,
        }
    }

    fn failure(kind: ExecutionErrorKind) -> ExecutionOutcome {
        ExecutionOutcome::Failure {
            kind,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_retry_on_recoverable_with_budget() {
        let repair = RepairController::new(2);
        assert!(repair.should_retry(&failure(ExecutionErrorKind::Syntax), 1));
        assert!(repair.should_retry(&failure(ExecutionErrorKind::SchemaMismatch), 1));
    }

    #[test]
    fn test_no_retry_when_budget_exhausted() {
        let repair = RepairController::new(2);
        assert!(!repair.should_retry(&failure(ExecutionErrorKind::Syntax), 2));
    }

    #[test]
    fn test_non_recoverable_short_circuits_with_budget_left() {
        let repair = RepairController::new(5);
        assert!(!repair.should_retry(&failure(ExecutionErrorKind::Timeout), 1));
        assert!(!repair.should_retry(&failure(ExecutionErrorKind::AccessDenied), 1));
        assert!(!repair.should_retry(&failure(ExecutionErrorKind::Unknown), 1));
    }

    #[test]
    fn test_no_retry_on_success() {
        let repair = RepairController::new(2);
        let rows = ExecutionOutcome::Rows {
            columns: vec![],
            rows: vec![],
        };
        assert!(!repair.should_retry(&rows, 1));
    }

    #[test]
    fn test_feedback_carries_query_and_error() {
        let repair = RepairController::new(2);
        let fb = repair.build_feedback(
            &attempt("SELECT * FROM Ordes"),
            &ExecutionOutcome::Failure {
                kind: ExecutionErrorKind::SchemaMismatch,
                message: "no such table: Ordes".to_string(),
            },
        );
        assert!(fb.contains("SELECT * FROM Ordes"));
        assert!(fb.contains("schema-mismatch"));
        assert!(fb.contains("no such table: Ordes"));
    }

    #[test]
    fn test_zero_max_attempts_clamped_to_one() {
        let repair = RepairController::new(0);
        assert_eq!(repair.max_attempts(), 1);
    }
}
