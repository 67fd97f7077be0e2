//! Shared types used across the Tabula application.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::TabulaError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Institutional prefix shared by every enrollment number the portal issues.
const ENROLLMENT_PREFIX: &str = "0105";

/// Largest identifier span a single job may cover.
///
/// One identifier costs a CAPTCHA solve and a full form round-trip, so an
/// unbounded range would keep a browser session alive for hours.
pub const MAX_RANGE_SPAN: u32 = 100;

/// Programme branches the portal recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Branch {
    /// Computer Science
    Cs,
    /// Information Technology
    It,
    /// Mechanical Engineering
    Me,
    /// Artificial Intelligence
    Ai,
    /// Data Science
    Ds,
    /// Electronics & Communication
    Ec,
    /// Electrical Engineering
    Ex,
}

impl Branch {
    /// All branches accepted by the job submission interface.
    pub const ALL: [Branch; 7] = [
        Branch::Cs,
        Branch::It,
        Branch::Me,
        Branch::Ai,
        Branch::Ds,
        Branch::Ec,
        Branch::Ex,
    ];

    /// Two-letter branch code as it appears inside enrollment numbers.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cs => "CS",
            Self::It => "IT",
            Self::Me => "ME",
            Self::Ai => "AI",
            Self::Ds => "DS",
            Self::Ec => "EC",
            Self::Ex => "EX",
        }
    }
}

impl FromStr for Branch {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CS" => Ok(Self::Cs),
            "IT" => Ok(Self::It),
            "ME" => Ok(Self::Me),
            "AI" => Ok(Self::Ai),
            "DS" => Ok(Self::Ds),
            "EC" => Ok(Self::Ec),
            "EX" => Ok(Self::Ex),
            other => Err(TabulaError::Validation(format!(
                "unknown branch '{other}': expected one of CS, IT, ME, AI, DS, EC, EX"
            ))),
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Newtype for two-digit admission years with validation.
///
/// The portal encodes the admission year as exactly two digits ("21" for 2021).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdmissionYear(String);

impl AdmissionYear {
    /// Create a new `AdmissionYear` from a string.
    ///
    /// # Errors
    /// Returns error if the value is not exactly two ASCII digits.
    pub fn new(year: impl Into<String>) -> Result<Self, TabulaError> {
        let year = year.into();
        Self::validate(&year)?;
        Ok(Self(year))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(year: &str) -> Result<(), TabulaError> {
        static YEAR_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = YEAR_REGEX.get_or_init(|| Regex::new(r"^[0-9]{2}$").expect("valid regex"));

        if regex.is_match(year) {
            Ok(())
        } else {
            Err(TabulaError::Validation(format!(
                "invalid admission year: must be two digits, got '{year}'"
            )))
        }
    }
}

impl fmt::Display for AdmissionYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully-formed enrollment number.
///
/// Construction is a pure function of (branch, year, sequence number):
/// institutional prefix, branch code, admission year, the regular-admission
/// digit, and the zero-padded sequence number within the job range.
/// Immutable once formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId {
    value: String,
    seq: u32,
}

impl EnrollmentId {
    /// Build the enrollment number for one sequence position.
    #[must_use]
    pub fn new(branch: Branch, year: &AdmissionYear, seq: u32) -> Self {
        let value = format!("{ENROLLMENT_PREFIX}{}{}1{seq:03}", branch.code(), year);
        Self { value, seq }
    }

    /// The rendered identifier, e.g. `0105CS211042`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Sequence position this identifier was generated from.
    #[must_use]
    pub fn seq(&self) -> u32 {
        self.seq
    }
}

impl fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Validated parameters for one scrape job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParams {
    /// Programme branch to iterate.
    pub branch: Branch,
    /// Two-digit admission year.
    pub year: AdmissionYear,
    /// Semester whose results are queried (1-8).
    pub semester: u8,
    /// First sequence number, inclusive.
    pub start: u32,
    /// Last sequence number, inclusive.
    pub end: u32,
}

impl JobParams {
    /// Create job parameters, rejecting out-of-domain values up front.
    ///
    /// # Errors
    /// Returns a validation error for an unknown branch string, a malformed
    /// year, a semester outside 1-8, an inverted range, or a range wider
    /// than [`MAX_RANGE_SPAN`].
    pub fn new(
        branch: Branch,
        year: &str,
        semester: u8,
        start: u32,
        end: u32,
    ) -> Result<Self, TabulaError> {
        let year = AdmissionYear::new(year)?;

        if !(1..=8).contains(&semester) {
            return Err(TabulaError::Validation(format!(
                "invalid semester: must be 1-8, got {semester}"
            )));
        }
        if start == 0 {
            return Err(TabulaError::Validation(
                "invalid range: sequence numbers start at 1".to_string(),
            ));
        }
        if start > end {
            return Err(TabulaError::Validation(format!(
                "invalid range: start {start} is greater than end {end}"
            )));
        }
        let span = end - start + 1;
        if span > MAX_RANGE_SPAN {
            return Err(TabulaError::Validation(format!(
                "range spans {span} identifiers, exceeding the {MAX_RANGE_SPAN} cap"
            )));
        }

        Ok(Self {
            branch,
            year,
            semester,
            start,
            end,
        })
    }

    /// Number of identifiers the job will visit.
    #[must_use]
    pub fn span(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Generate the identifier at one sequence position of this job.
    #[must_use]
    pub fn enrollment_id(&self, seq: u32) -> EnrollmentId {
        EnrollmentId::new(self.branch, &self.year, seq)
    }
}
