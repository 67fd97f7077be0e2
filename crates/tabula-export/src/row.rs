//! The ordered result-row record.

use serde::{Deserialize, Serialize};

/// One successfully parsed result record.
///
/// `subjects` and `grades` are parallel, in the order the portal's results
/// table listed them. The first row of a job establishes the subject-column
/// schema; later rows are fitted to it by the sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Enrollment number the record belongs to
    pub enrollment: String,
    /// Candidate name
    pub name: String,
    /// Subject codes in table order
    pub subjects: Vec<String>,
    /// Grades, parallel to `subjects`
    pub grades: Vec<String>,
    /// Semester grade point average
    pub sgpa: String,
    /// Cumulative grade point average
    pub cgpa: String,
    /// Overall remark (pass/fail text)
    pub remark: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_roundtrip() {
        let row = ResultRow {
            enrollment: "0105CS211001".to_string(),
            name: "A Student".to_string(),
            subjects: vec!["CS-301".to_string()],
            grades: vec!["A".to_string()],
            sgpa: "8.5".to_string(),
            cgpa: "8.2".to_string(),
            remark: "PASS".to_string(),
        };
        let json = serde_json::to_string(&row).expect("serialize row");
        let parsed: ResultRow = serde_json::from_str(&json).expect("deserialize row");
        assert_eq!(parsed, row);
    }
}
