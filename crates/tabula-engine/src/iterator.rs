//! The enrollment-iteration state machine.
//!
//! Drives one identifier at a time through solve, submit and classify,
//! with bounded retries for attempts that produce neither a result nor a
//! definitive miss, and a page-refresh recovery path for wedged sessions.

use crate::error::{Result, ScrapeError};
use crate::outcome::AttemptOutcome;
use crate::parser;
use crate::session::FormSession;
use std::sync::Arc;
use tabula_captcha::CaptchaReader;
use tabula_core::config::ScrapeConfig;
use tabula_core::EnrollmentId;
use tokio_util::sync::CancellationToken;

/// Substring of the portal's modal alert that identifies a definitive
/// record-not-found answer.
const NOT_FOUND_ALERT_MARKER: &str = "Result";

/// Processes identifiers one at a time against a live form session.
pub struct EnrollmentIterator {
    captcha: Arc<dyn CaptchaReader>,
    config: ScrapeConfig,
    semester: u8,
    cancel: CancellationToken,
    consecutive_failures: u32,
}

impl EnrollmentIterator {
    /// Create an iterator for one job's semester.
    #[must_use]
    pub fn new(
        captcha: Arc<dyn CaptchaReader>,
        config: ScrapeConfig,
        semester: u8,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            captcha,
            config,
            semester,
            cancel,
            consecutive_failures: 0,
        }
    }

    /// Drive one identifier through up to `max_attempts` attempts.
    ///
    /// A settled outcome (`Success` or `RecordNotFound`) resets the form and
    /// returns immediately. Failed attempts retry the same identifier; once
    /// the budget is spent, the exhausted failure is returned and the caller
    /// records the identifier as unresolved and advances.
    ///
    /// Cancellation is checked at the top of the attempt loop, so at most
    /// one in-flight attempt completes after it is requested.
    ///
    /// # Errors
    /// Returns [`ScrapeError::SessionExhausted`] when the refresh recovery
    /// path itself fails; the job cannot continue on this session.
    pub async fn process_identifier(
        &mut self,
        id: &EnrollmentId,
        session: &mut FormSession,
    ) -> Result<AttemptOutcome> {
        let mut last_reason = String::new();

        for attempt in 1..=self.config.max_attempts {
            if self.cancel.is_cancelled() {
                return Ok(AttemptOutcome::SolveOrSubmitFailure {
                    reason: "cancelled before attempt".to_string(),
                });
            }

            let outcome = self.attempt_once(id, session).await;

            match outcome {
                AttemptOutcome::Success(_) | AttemptOutcome::RecordNotFound => {
                    self.consecutive_failures = 0;
                    self.settle_form(session).await?;
                    return Ok(outcome);
                }
                AttemptOutcome::SolveOrSubmitFailure { ref reason } => {
                    self.consecutive_failures += 1;
                    last_reason.clone_from(reason);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        self.config.max_attempts,
                        id,
                        reason
                    );

                    if self.consecutive_failures >= self.config.refresh_after_failures {
                        self.recover_by_refresh(session).await?;
                    } else if let Err(e) = session.clear_inputs().await {
                        tracing::warn!("Failed to clear inputs after failed attempt: {}", e);
                    }
                }
            }
        }

        Ok(AttemptOutcome::SolveOrSubmitFailure {
            reason: format!("retries exhausted: {last_reason}"),
        })
    }

    /// One pass through the attempt states. Driver faults are folded into
    /// `SolveOrSubmitFailure` so they share the retry accounting.
    async fn attempt_once(&self, id: &EnrollmentId, session: &FormSession) -> AttemptOutcome {
        match self.try_attempt(id, session).await {
            Ok(outcome) => outcome,
            Err(e) => AttemptOutcome::SolveOrSubmitFailure {
                reason: e.to_string(),
            },
        }
    }

    async fn try_attempt(&self, id: &EnrollmentId, session: &FormSession) -> Result<AttemptOutcome> {
        // Solve the current captcha. Text below the minimum length is not
        // worth a submission; it burns an attempt without touching the form.
        let image_src = session.captcha_image_src().await?;
        let captcha_text = self.captcha.read(&image_src).await?;
        if captcha_text.len() < self.config.min_captcha_len {
            return Ok(AttemptOutcome::SolveOrSubmitFailure {
                reason: format!("captcha read too short: {captcha_text:?}"),
            });
        }

        session
            .submit_query(self.semester, &captcha_text, id.as_str())
            .await?;

        // Drain any modal alert before inspecting the page, then classify.
        let alert = session.take_alert().await?;
        let html = session.page_content().await?;

        if parser::has_results_marker(&html) {
            let row = parser::parse_result_page(&html, id.as_str())?;
            tracing::info!("Extracted result row for {}", id);
            return Ok(AttemptOutcome::Success(row));
        }

        match alert {
            Some(text) if text.contains(NOT_FOUND_ALERT_MARKER) => {
                tracing::info!("No record for {}", id);
                Ok(AttemptOutcome::RecordNotFound)
            }
            Some(text) => Ok(AttemptOutcome::SolveOrSubmitFailure {
                reason: format!("unrecognized alert: {text}"),
            }),
            None => Ok(AttemptOutcome::SolveOrSubmitFailure {
                reason: "no results table and no alert; assuming bad captcha".to_string(),
            }),
        }
    }

    /// Reset the form after a settled identifier. A failed reset is retried
    /// once via refresh; if that fails too the session is beyond recovery.
    async fn settle_form(&self, session: &FormSession) -> Result<()> {
        if let Err(e) = session.reset().await {
            tracing::warn!("Form reset failed ({}), falling back to refresh", e);
            session
                .refresh()
                .await
                .map_err(|refresh_err| ScrapeError::SessionExhausted(refresh_err.to_string()))?;
        }
        Ok(())
    }

    async fn recover_by_refresh(&mut self, session: &FormSession) -> Result<()> {
        tracing::warn!(
            "{} consecutive failed attempts, refreshing session page",
            self.consecutive_failures
        );
        session
            .refresh()
            .await
            .map_err(|e| ScrapeError::SessionExhausted(e.to_string()))?;
        self.consecutive_failures = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tabula_browser::PortalActions;

    const RESULT_PAGE: &str = r#"
        <html><body>
        <span id="ctl00_ContentPlaceHolder1_lblNameGrading">A STUDENT</span>
        <table class="gridtable">
            <tr><td>CS-301 [T]</td><td>4</td><td>4</td><td>A</td></tr>
            <tr><td>Total Credit</td><td>4</td><td></td><td></td></tr>
        </table>
        <span id="ctl00_ContentPlaceHolder1_lblSGPA">8.0</span>
        <span id="ctl00_ContentPlaceHolder1_lblcgpa">7.9</span>
        <span id="ctl00_ContentPlaceHolder1_lblResultNewGrading">PASS</span>
        </body></html>
    "#;

    const BLANK_PAGE: &str = "<html><body>enter details</body></html>";

    /// Driver whose page content and alert are scripted per test.
    #[derive(Default)]
    struct ScriptedDriver {
        page_html: Mutex<String>,
        alert: Mutex<Option<String>>,
        resets: AtomicUsize,
        refreshes: AtomicUsize,
        clears: AtomicUsize,
        fail_refresh: bool,
    }

    #[async_trait]
    impl PortalActions for ScriptedDriver {
        async fn navigate(&self, _url: &str) -> tabula_browser::Result<()> {
            Ok(())
        }
        async fn click(&self, selector: &str) -> tabula_browser::Result<()> {
            if selector.contains("btnReset") {
                self.resets.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
        async fn fill_field(&self, _selector: &str, _value: &str) -> tabula_browser::Result<()> {
            Ok(())
        }
        async fn clear_field(&self, _selector: &str) -> tabula_browser::Result<()> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn select_option(&self, _selector: &str, _value: &str) -> tabula_browser::Result<()> {
            Ok(())
        }
        async fn element_text(&self, _selector: &str) -> tabula_browser::Result<String> {
            Ok(String::new())
        }
        async fn element_attr(
            &self,
            _selector: &str,
            _attr: &str,
        ) -> tabula_browser::Result<Option<String>> {
            Ok(Some("/Result/CaptchaImage.axd?guid=test".to_string()))
        }
        async fn page_content(&self) -> tabula_browser::Result<String> {
            Ok(self.page_html.lock().expect("page lock").clone())
        }
        async fn take_alert(&self) -> tabula_browser::Result<Option<String>> {
            Ok(self.alert.lock().expect("alert lock").take())
        }
        async fn refresh(&self) -> tabula_browser::Result<()> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.fail_refresh {
                return Err(tabula_browser::BrowserError::Timeout(
                    "refresh timed out".to_string(),
                ));
            }
            Ok(())
        }
        async fn close(&self) -> tabula_browser::Result<()> {
            Ok(())
        }
    }

    /// Reader returning a fixed recognition for every captcha.
    struct FixedReader {
        text: String,
        calls: AtomicUsize,
    }

    impl FixedReader {
        fn new(text: &str) -> Self {
            Self {
                text: text.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CaptchaReader for FixedReader {
        async fn read(&self, _image_src: &str) -> tabula_captcha::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.clone())
        }
    }

    fn fast_config() -> ScrapeConfig {
        ScrapeConfig {
            settle_ms: 0,
            ..ScrapeConfig::default()
        }
    }

    fn session_over(driver: Arc<ScriptedDriver>) -> FormSession {
        FormSession::new(Box::new(ArcDriver(driver)), Duration::ZERO)
    }

    /// Newtype so tests can keep a handle to the driver they hand out.
    struct ArcDriver(Arc<ScriptedDriver>);

    #[async_trait]
    impl PortalActions for ArcDriver {
        async fn navigate(&self, url: &str) -> tabula_browser::Result<()> {
            self.0.navigate(url).await
        }
        async fn click(&self, selector: &str) -> tabula_browser::Result<()> {
            self.0.click(selector).await
        }
        async fn fill_field(&self, selector: &str, value: &str) -> tabula_browser::Result<()> {
            self.0.fill_field(selector, value).await
        }
        async fn clear_field(&self, selector: &str) -> tabula_browser::Result<()> {
            self.0.clear_field(selector).await
        }
        async fn select_option(&self, selector: &str, value: &str) -> tabula_browser::Result<()> {
            self.0.select_option(selector, value).await
        }
        async fn element_text(&self, selector: &str) -> tabula_browser::Result<String> {
            self.0.element_text(selector).await
        }
        async fn element_attr(
            &self,
            selector: &str,
            attr: &str,
        ) -> tabula_browser::Result<Option<String>> {
            self.0.element_attr(selector, attr).await
        }
        async fn page_content(&self) -> tabula_browser::Result<String> {
            self.0.page_content().await
        }
        async fn take_alert(&self) -> tabula_browser::Result<Option<String>> {
            self.0.take_alert().await
        }
        async fn refresh(&self) -> tabula_browser::Result<()> {
            self.0.refresh().await
        }
        async fn close(&self) -> tabula_browser::Result<()> {
            self.0.close().await
        }
    }

    fn test_id() -> EnrollmentId {
        let year = tabula_core::AdmissionYear::new("21").expect("valid year");
        EnrollmentId::new(tabula_core::Branch::Cs, &year, 1)
    }

    #[tokio::test]
    async fn test_success_extracts_row_and_resets_form() {
        let driver = Arc::new(ScriptedDriver::default());
        *driver.page_html.lock().expect("page lock") = RESULT_PAGE.to_string();
        let mut session = session_over(driver.clone());

        let reader = Arc::new(FixedReader::new("AB12"));
        let mut iterator = EnrollmentIterator::new(reader, fast_config(), 3, CancellationToken::new());

        let outcome = iterator
            .process_identifier(&test_id(), &mut session)
            .await
            .expect("process identifier");

        assert!(outcome.is_success());
        assert_eq!(driver.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_not_found_alert_settles_identifier() {
        let driver = Arc::new(ScriptedDriver::default());
        *driver.page_html.lock().expect("page lock") = BLANK_PAGE.to_string();
        *driver.alert.lock().expect("alert lock") =
            Some("Result for this Enrollment No. not Found".to_string());
        let mut session = session_over(driver.clone());

        let reader = Arc::new(FixedReader::new("AB12"));
        let mut iterator = EnrollmentIterator::new(reader, fast_config(), 3, CancellationToken::new());

        let outcome = iterator
            .process_identifier(&test_id(), &mut session)
            .await
            .expect("process identifier");

        assert_eq!(outcome, AttemptOutcome::RecordNotFound);
        assert_eq!(driver.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_captcha_burns_exactly_three_attempts() {
        let driver = Arc::new(ScriptedDriver::default());
        *driver.page_html.lock().expect("page lock") = BLANK_PAGE.to_string();
        let mut session = session_over(driver.clone());

        let reader = Arc::new(FixedReader::new(""));
        let mut iterator = EnrollmentIterator::new(reader.clone(), fast_config(), 3, CancellationToken::new());

        let outcome = iterator
            .process_identifier(&test_id(), &mut session)
            .await
            .expect("process identifier");

        assert!(outcome.is_failure());
        assert_eq!(reader.calls.load(Ordering::SeqCst), 3);
        // Unsettled identifiers never reset the form
        assert_eq!(driver.resets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_captcha_clears_inputs_between_attempts() {
        let driver = Arc::new(ScriptedDriver::default());
        *driver.page_html.lock().expect("page lock") = BLANK_PAGE.to_string();
        let mut session = session_over(driver.clone());

        // Plausible-length reads that the portal keeps rejecting
        let reader = Arc::new(FixedReader::new("WRNG"));
        let mut iterator = EnrollmentIterator::new(reader, fast_config(), 3, CancellationToken::new());

        let outcome = iterator
            .process_identifier(&test_id(), &mut session)
            .await
            .expect("process identifier");

        assert!(outcome.is_failure());
        // clear_field runs for both inputs after each of the 3 failures
        assert_eq!(driver.clears.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_refresh_after_consecutive_failure_threshold() {
        let driver = Arc::new(ScriptedDriver::default());
        *driver.page_html.lock().expect("page lock") = BLANK_PAGE.to_string();
        let mut session = session_over(driver.clone());

        let reader = Arc::new(FixedReader::new(""));
        let mut iterator = EnrollmentIterator::new(reader, fast_config(), 3, CancellationToken::new());

        // 3 failures on the first identifier, 2 more on the second reach
        // the threshold of 5 and trigger exactly one refresh.
        let _ = iterator
            .process_identifier(&test_id(), &mut session)
            .await
            .expect("first identifier");
        let _ = iterator
            .process_identifier(&test_id(), &mut session)
            .await
            .expect("second identifier");

        assert_eq!(driver.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_aborts_with_session_exhausted() {
        let driver = Arc::new(ScriptedDriver {
            fail_refresh: true,
            ..ScriptedDriver::default()
        });
        *driver.page_html.lock().expect("page lock") = BLANK_PAGE.to_string();
        let mut session = session_over(driver.clone());

        let reader = Arc::new(FixedReader::new(""));
        let mut config = fast_config();
        config.refresh_after_failures = 2;
        let mut iterator = EnrollmentIterator::new(reader, config, 3, CancellationToken::new());

        let err = iterator
            .process_identifier(&test_id(), &mut session)
            .await
            .expect_err("refresh failure should abort");

        assert!(matches!(err, ScrapeError::SessionExhausted(_)));
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_attempt() {
        let driver = Arc::new(ScriptedDriver::default());
        *driver.page_html.lock().expect("page lock") = BLANK_PAGE.to_string();
        let mut session = session_over(driver.clone());

        let reader = Arc::new(FixedReader::new(""));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut iterator = EnrollmentIterator::new(reader.clone(), fast_config(), 3, cancel);

        let outcome = iterator
            .process_identifier(&test_id(), &mut session)
            .await
            .expect("process identifier");

        assert!(outcome.is_failure());
        // No attempt ran once cancellation was observed
        assert_eq!(reader.calls.load(Ordering::SeqCst), 0);
    }
}
