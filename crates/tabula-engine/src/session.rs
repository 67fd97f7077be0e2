//! Portal session primitives and the recycling pool.

use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tabula_browser::{BrowserEngine, PortalActions};
use tabula_core::config::{PortalConfig, ScrapeConfig};

// Form element ids as the portal renders them. A change to any of these
// implies the extraction logic needs review too, so they stay constants.
const SEMESTER_SELECT: &str = "#ctl00_ContentPlaceHolder1_drpSemester";
const CAPTCHA_INPUT: &str = "#ctl00_ContentPlaceHolder1_TextBox1";
const ENROLLMENT_INPUT: &str = "#ctl00_ContentPlaceHolder1_txtrollno";
const VIEW_RESULT_BUTTON: &str = "#ctl00_ContentPlaceHolder1_btnviewresult";
const RESET_BUTTON: &str = "#ctl00_ContentPlaceHolder1_btnReset";
const CAPTCHA_IMAGE: &str = "img[src*='CaptchaImage.axd']";

/// Creates raw driver sessions.
///
/// The pool goes through this seam so tests can hand out scripted sessions
/// and count how often a fresh one was requested.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open a fresh, blank driver session.
    async fn create(&self) -> Result<Box<dyn PortalActions>>;
}

/// Factory producing real browser tabs.
pub struct ChromiumSessionFactory {
    engine: Arc<BrowserEngine>,
}

impl ChromiumSessionFactory {
    /// Create a factory over a running browser engine.
    #[must_use]
    pub fn new(engine: Arc<BrowserEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn create(&self) -> Result<Box<dyn PortalActions>> {
        let session = self.engine.new_session().await?;
        Ok(Box::new(session))
    }
}

/// One live form session on the result-query page.
///
/// Owns the driver session exclusively and exposes the handful of
/// primitives the attempt loop needs. Created primed (entry page loaded,
/// programme selected) by the pool.
pub struct FormSession {
    driver: Box<dyn PortalActions>,
    settle: Duration,
}

impl FormSession {
    pub(crate) fn new(driver: Box<dyn PortalActions>, settle: Duration) -> Self {
        Self { driver, settle }
    }

    /// Src attribute of the current captcha image.
    pub async fn captcha_image_src(&self) -> Result<String> {
        self.driver
            .element_attr(CAPTCHA_IMAGE, "src")
            .await?
            .ok_or_else(|| {
                ScrapeError::TransientSessionFault("captcha image has no src attribute".to_string())
            })
    }

    /// Fill the query form and submit it.
    ///
    /// The page reacts to input asynchronously, so each step is followed by
    /// a settle delay before the next element is touched; skipping these
    /// makes the portal drop keystrokes.
    pub async fn submit_query(
        &self,
        semester: u8,
        captcha_text: &str,
        enrollment: &str,
    ) -> Result<()> {
        self.driver
            .select_option(SEMESTER_SELECT, &semester.to_string())
            .await?;
        self.driver.fill_field(CAPTCHA_INPUT, captcha_text).await?;
        tokio::time::sleep(self.settle).await;
        self.driver.fill_field(ENROLLMENT_INPUT, enrollment).await?;
        tokio::time::sleep(self.settle).await;
        self.driver.click(VIEW_RESULT_BUTTON).await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Take the pending modal alert, if any.
    pub async fn take_alert(&self) -> Result<Option<String>> {
        Ok(self.driver.take_alert().await?)
    }

    /// Current page source.
    pub async fn page_content(&self) -> Result<String> {
        Ok(self.driver.page_content().await?)
    }

    /// Empty the captcha and enrollment fields before a retry.
    pub async fn clear_inputs(&self) -> Result<()> {
        self.driver.clear_field(CAPTCHA_INPUT).await?;
        self.driver.clear_field(ENROLLMENT_INPUT).await?;
        Ok(())
    }

    /// Reset the form. Mandatory after every settled identifier; residual
    /// state corrupts the next attempt.
    pub async fn reset(&self) -> Result<()> {
        self.driver.click(RESET_BUTTON).await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Reload the page to recover a wedged session.
    pub async fn refresh(&self) -> Result<()> {
        self.driver.refresh().await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.driver.close().await?;
        Ok(())
    }
}

/// Creates, recycles and retires form sessions.
///
/// Long-lived portal sessions grow memory without bound, so after
/// `rotate_after` processed identifiers the live session is destroyed and
/// a replacement is primed (re-navigate, re-select programme).
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    portal: PortalConfig,
    rotate_after: u32,
    settle: Duration,
    processed: u32,
    current: Option<FormSession>,
}

impl SessionPool {
    /// Create a pool; no session is opened until the first `acquire`.
    #[must_use]
    pub fn new(factory: Arc<dyn SessionFactory>, portal: PortalConfig, config: &ScrapeConfig) -> Self {
        Self {
            factory,
            portal,
            rotate_after: config.rotate_after,
            settle: Duration::from_millis(config.settle_ms),
            processed: 0,
            current: None,
        }
    }

    /// Hand out the live session, creating and priming one if needed.
    pub async fn acquire(&mut self) -> Result<&mut FormSession> {
        if self.current.is_none() {
            let session = self.create_primed().await?;
            self.current = Some(session);
        }
        Ok(self.current.as_mut().expect("session just installed"))
    }

    /// Count one processed identifier, rotating the session when due.
    pub async fn mark_processed(&mut self) -> Result<()> {
        self.processed += 1;
        if self.processed >= self.rotate_after {
            tracing::info!(
                "Rotating portal session after {} processed identifiers",
                self.processed
            );
            self.retire_and_recreate().await?;
        }
        Ok(())
    }

    /// Destroy the live session and prime a replacement.
    pub async fn retire_and_recreate(&mut self) -> Result<&mut FormSession> {
        if let Some(old) = self.current.take() {
            if let Err(e) = old.close().await {
                tracing::warn!("Failed to close retired session: {}", e);
            }
        }
        let fresh = self.create_primed().await?;
        self.processed = 0;
        self.current = Some(fresh);
        Ok(self.current.as_mut().expect("session just installed"))
    }

    /// Destroy the live session, if any. Called on every job exit path.
    pub async fn release(&mut self) -> Result<()> {
        self.processed = 0;
        if let Some(session) = self.current.take() {
            session.close().await?;
        }
        Ok(())
    }

    async fn create_primed(&self) -> Result<FormSession> {
        let driver = self.factory.create().await?;
        driver.navigate(&self.portal.entry_url).await?;
        driver
            .click(&format!("#{}", self.portal.program_option_id))
            .await?;
        tracing::debug!("Portal session primed at {}", self.portal.entry_url);
        Ok(FormSession::new(driver, self.settle))
    }
}
