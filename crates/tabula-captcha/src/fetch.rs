//! Captcha image acquisition.

use crate::error::{CaptchaError, Result};
use std::time::Duration;
use tabula_core::config::{OcrConfig, PortalConfig};

/// Fetches captcha image bytes from the portal.
///
/// The portal embeds the challenge as an `<img>` whose src points at a
/// one-shot image handler. The src is resolved against the fixed result
/// host: the page may render it relative or absolute, but the handler
/// path after the `Result/` segment is what identifies the image.
pub struct CaptchaFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl CaptchaFetcher {
    /// Create a fetcher bound to the configured portal host.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(portal: &PortalConfig, ocr: &OcrConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(ocr.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: portal.result_base_url.clone(),
        })
    }

    /// Resolve the `<img>` src attribute to the absolute image URL.
    pub fn resolve_image_url(&self, img_src: &str) -> Result<String> {
        resolve_image_url(&self.base_url, img_src)
    }

    /// Download the image bytes behind an `<img>` src attribute.
    pub async fn fetch(&self, img_src: &str) -> Result<Vec<u8>> {
        let url = self.resolve_image_url(img_src)?;
        tracing::debug!("Fetching captcha image from {}", url);

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Rebuild the captcha image URL against the fixed portal host.
///
/// Takes the handler path after the last `Result/` segment of the src and
/// appends it to `base_url`. A src without that segment is resolved as a
/// plain relative URL instead.
pub fn resolve_image_url(base_url: &str, img_src: &str) -> Result<String> {
    if img_src.trim().is_empty() {
        return Err(CaptchaError::InvalidImageUrl(img_src.to_string()));
    }

    if let Some((_, handler_path)) = img_src.rsplit_once("Result/") {
        return Ok(format!("{base_url}{handler_path}"));
    }

    let base = url::Url::parse(base_url)
        .map_err(|_| CaptchaError::InvalidImageUrl(base_url.to_string()))?;
    base.join(img_src)
        .map(|u| u.to_string())
        .map_err(|_| CaptchaError::InvalidImageUrl(img_src.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://result.rgpv.ac.in/result/";

    #[test]
    fn test_resolve_absolute_src() {
        let url = resolve_image_url(
            BASE,
            "http://result.rgpv.ac.in/Result/CaptchaImage.axd?guid=abc123",
        )
        .expect("resolve absolute src");
        assert_eq!(
            url,
            "http://result.rgpv.ac.in/result/CaptchaImage.axd?guid=abc123"
        );
    }

    #[test]
    fn test_resolve_relative_src_with_marker() {
        let url = resolve_image_url(BASE, "/Result/CaptchaImage.axd?guid=xyz")
            .expect("resolve relative src");
        assert_eq!(
            url,
            "http://result.rgpv.ac.in/result/CaptchaImage.axd?guid=xyz"
        );
    }

    #[test]
    fn test_resolve_plain_relative_src() {
        let url = resolve_image_url(BASE, "CaptchaImage.axd?guid=xyz").expect("resolve plain src");
        assert_eq!(
            url,
            "http://result.rgpv.ac.in/result/CaptchaImage.axd?guid=xyz"
        );
    }

    #[test]
    fn test_resolve_empty_src_rejected() {
        assert!(resolve_image_url(BASE, "").is_err());
        assert!(resolve_image_url(BASE, "   ").is_err());
    }
}
