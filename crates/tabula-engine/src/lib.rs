//! Tabula Engine - Enrollment-iteration orchestration.
//!
//! This crate is the core of Tabula: the state machine that drives a portal
//! session through repeated query/response cycles across a numeric range of
//! enrollment numbers. It classifies every attempt, retries transient
//! failures within a fixed budget, recycles browser sessions on a rotation
//! threshold, and accumulates extracted rows into the export sink.
//!
//! # Features
//!
//! - Bounded per-identifier retry with explicit [`AttemptOutcome`] classification
//! - Page-refresh recovery after a run of consecutive failures
//! - Session rotation to bound browser memory growth on long ranges
//! - Cooperative job cancellation and thread-safe progress snapshots
//! - Partial artifacts: collected rows survive any abort path
//!
//! # Example
//!
//! ```rust,ignore
//! use tabula_engine::{validate_params, ScrapeController};
//!
//! let params = validate_params("CS", "21", 3, 1, 40)?;
//! let controller = ScrapeController::new(params, pool, sink, captcha, config);
//! let monitor = controller.monitor();
//!
//! let report = tokio::spawn(controller.run()).await?;
//! println!("{} unresolved", report.unresolved.len());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod controller;
#[allow(missing_docs)]
pub mod error;
pub mod iterator;
pub mod outcome;
#[allow(missing_docs)]
pub mod parser;
pub mod session;

// Re-export commonly used types
pub use controller::{
    artifact_stem, validate_params, JobMonitor, JobProgress, JobReport, ScrapeController,
};
pub use error::{Result, ScrapeError};
pub use iterator::EnrollmentIterator;
pub use outcome::AttemptOutcome;
pub use session::{ChromiumSessionFactory, FormSession, SessionFactory, SessionPool};
