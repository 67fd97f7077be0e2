//! Browser automation engine for the legacy results portal.
//!
//! Provides headless browser control behind the [`PortalActions`]
//! capability trait, so the scrape engine never touches the CDP directly
//! and tests can substitute a scripted session.

pub mod actions;
pub mod engine;
pub mod error;
pub mod fingerprint;

pub use actions::PortalActions;
pub use engine::{BrowserEngine, BrowserSession};
pub use error::{BrowserError, Result};
