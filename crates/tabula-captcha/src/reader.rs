//! One-call captcha capability: acquisition plus recognition.

use crate::error::Result;
use crate::fetch::CaptchaFetcher;
use crate::solver::CaptchaSolver;
use async_trait::async_trait;

/// The capability the scrape engine consumes: given the src attribute of
/// the portal's captcha `<img>`, produce best-effort text.
///
/// Bundling acquisition and recognition keeps the engine free of HTTP
/// concerns and lets tests script the whole step with one mock.
#[async_trait]
pub trait CaptchaReader: Send + Sync {
    /// Fetch the image behind `image_src` and recognize its text.
    ///
    /// An empty string means the image was unreadable; the caller decides
    /// whether the text is long enough to trust.
    async fn read(&self, image_src: &str) -> Result<String>;
}

/// Production reader: HTTP fetch against the portal host, then the
/// configured solver.
pub struct PortalCaptchaReader {
    fetcher: CaptchaFetcher,
    solver: Box<dyn CaptchaSolver>,
}

impl PortalCaptchaReader {
    /// Combine a fetcher and a solver into one capability.
    #[must_use]
    pub fn new(fetcher: CaptchaFetcher, solver: Box<dyn CaptchaSolver>) -> Self {
        Self { fetcher, solver }
    }
}

#[async_trait]
impl CaptchaReader for PortalCaptchaReader {
    async fn read(&self, image_src: &str) -> Result<String> {
        let image = self.fetcher.fetch(image_src).await?;
        let text = self.solver.solve(&image).await?;
        tracing::debug!("Captcha recognized as {:?} ({} bytes in)", text, image.len());
        Ok(text)
    }
}
