//! Attempt outcome classification.

use serde::{Deserialize, Serialize};
use tabula_export::ResultRow;

/// Outcome of one query attempt against a single enrollment number.
///
/// Produced once per attempt and consumed immediately by the retry loop;
/// never persisted beyond the iteration that created it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AttemptOutcome {
    /// The results table rendered and a row was extracted
    Success(ResultRow),

    /// The portal answered definitively that no record exists
    RecordNotFound,

    /// The attempt produced neither a result nor a definitive miss
    /// (bad CAPTCHA read, submit fault, wedged page)
    SolveOrSubmitFailure {
        /// Why the attempt is being discounted
        reason: String,
    },
}

impl AttemptOutcome {
    /// Check if the outcome carries a result row
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Check if the outcome settles the identifier (no retry needed)
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Success(_) | Self::RecordNotFound)
    }

    /// Check if the outcome counts against the retry budget
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::SolveOrSubmitFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> ResultRow {
        ResultRow {
            enrollment: "0105CS211001".to_string(),
            name: "A Student".to_string(),
            subjects: vec!["CS-301".to_string()],
            grades: vec!["A".to_string()],
            sgpa: "8.0".to_string(),
            cgpa: "7.8".to_string(),
            remark: "PASS".to_string(),
        }
    }

    #[test]
    fn test_success_is_settled() {
        let outcome = AttemptOutcome::Success(sample_row());
        assert!(outcome.is_success());
        assert!(outcome.is_settled());
        assert!(!outcome.is_failure());
    }

    #[test]
    fn test_not_found_is_settled_but_not_success() {
        let outcome = AttemptOutcome::RecordNotFound;
        assert!(!outcome.is_success());
        assert!(outcome.is_settled());
    }

    #[test]
    fn test_failure_is_not_settled() {
        let outcome = AttemptOutcome::SolveOrSubmitFailure {
            reason: "captcha text too short".to_string(),
        };
        assert!(outcome.is_failure());
        assert!(!outcome.is_settled());
    }
}
