//! CAPTCHA solving.

use crate::error::{CaptchaError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tabula_core::config::OcrConfig;

/// CAPTCHA solver trait for pluggable implementations.
///
/// A solver turns raw image bytes into best-effort text. An empty string
/// signals an unreadable image; a wrong-but-plausible read is still `Ok`.
/// Errors are reserved for transport-level failures (the service being
/// unreachable, timeouts), which the caller accounts as a failed attempt.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Attempt to recognize the text in a captcha image.
    async fn solve(&self, image: &[u8]) -> Result<String>;
}

/// Solver that never recognizes anything.
///
/// Stands in where no OCR service is configured; every attempt is reported
/// as unreadable so the engine's retry accounting still runs.
pub struct NullSolver;

#[async_trait]
impl CaptchaSolver for NullSolver {
    async fn solve(&self, _image: &[u8]) -> Result<String> {
        Ok(String::new())
    }
}

/// Solver backed by an HTTP OCR service.
///
/// Posts the raw image bytes and reads back `{"text": "..."}`. The request
/// carries a bounded timeout so a wedged service fails the attempt instead
/// of stalling the job.
pub struct HttpOcrSolver {
    client: reqwest::Client,
    endpoint_url: String,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: String,
}

impl HttpOcrSolver {
    /// Create a solver for the configured OCR endpoint.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
        })
    }
}

#[async_trait]
impl CaptchaSolver for HttpOcrSolver {
    async fn solve(&self, image: &[u8]) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint_url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await?
            .error_for_status()?;

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| CaptchaError::Ocr(format!("malformed OCR response: {e}")))?;

        Ok(normalize_captcha_text(&body.text))
    }
}

/// Normalize recognized captcha text the way the portal expects it typed:
/// uppercased, all whitespace removed.
#[must_use]
pub fn normalize_captcha_text(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_solver_returns_empty() {
        let solver = NullSolver;
        let text = solver.solve(b"not-an-image").await.expect("solve");
        assert!(text.is_empty());
    }

    #[test]
    fn test_normalize_uppercases_and_strips() {
        assert_eq!(normalize_captcha_text("a b1 c2\n"), "AB1C2");
        assert_eq!(normalize_captcha_text("XYZ123"), "XYZ123");
        assert_eq!(normalize_captcha_text("  \t "), "");
    }
}
