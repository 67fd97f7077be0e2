//! CAPTCHA acquisition and solving for the results portal.
//!
//! The portal gates every query behind a distorted-text image. This crate
//! provides the two capabilities the scrape engine consumes: fetching the
//! image bytes from the URL hidden in the page's `<img>` element, and
//! turning those bytes into best-effort text via a pluggable
//! [`CaptchaSolver`] implementation.

pub mod error;
pub mod fetch;
pub mod reader;
pub mod solver;

pub use error::{CaptchaError, Result};
pub use fetch::CaptchaFetcher;
pub use reader::{CaptchaReader, PortalCaptchaReader};
pub use solver::{normalize_captcha_text, CaptchaSolver, HttpOcrSolver, NullSolver};
