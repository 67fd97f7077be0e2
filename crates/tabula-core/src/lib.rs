//! Tabula Core - Foundation crate for the Tabula result scraper.
//!
//! This crate provides shared domain types, error handling, and configuration
//! management that all other Tabula crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`Branch`, `EnrollmentId`, `JobParams`)
//! - [`logging`] - Tracing subscriber setup for binaries and tests
//!
//! # Example
//!
//! ```rust
//! use tabula_core::{Branch, EnrollmentId, JobParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let params = JobParams::new(Branch::Cs, "21", 3, 1, 40)?;
//! let first = EnrollmentId::new(params.branch, &params.year, params.start);
//! assert_eq!(first.as_str(), "0105CS211001");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
#[allow(missing_docs)]
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, ExportConfig, OcrConfig, PortalConfig, ScrapeConfig};
pub use error::{ConfigError, ConfigResult, Result, TabulaError};
pub use types::{AdmissionYear, Branch, EnrollmentId, JobParams};
