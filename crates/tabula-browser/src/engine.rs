use crate::actions::PortalActions;
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tabula_core::config::BrowserConfig as BrowserSettings;
use tokio::sync::Mutex;

/// Browser automation engine.
///
/// Owns the launched browser process; individual portal sessions are
/// created from it as tabs and destroyed independently.
pub struct BrowserEngine {
    browser: Browser,
    settings: BrowserSettings,
}

impl BrowserEngine {
    /// Launch a browser with a randomized fingerprint.
    pub async fn new(settings: BrowserSettings) -> Result<Self> {
        Self::with_fingerprint(settings, FingerprintConfig::randomized()).await
    }

    /// Launch a browser with a specific fingerprint.
    pub async fn with_fingerprint(
        settings: BrowserSettings,
        fingerprint: FingerprintConfig,
    ) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .arg(format!("--user-agent={}", fingerprint.user_agent));
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Spawn browser handler
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self { browser, settings })
    }

    /// Open a fresh tab and wrap it as a portal session.
    pub async fn new_session(&self) -> Result<BrowserSession> {
        let page = self.browser.new_page("about:blank").await?;
        BrowserSession::attach(page, self.settings.navigation_timeout_secs).await
    }

    /// Shut the browser process down.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}

/// One live portal session, backed by a single CDP page.
///
/// Modal alerts are dismissed as they open and their text is parked until
/// the next [`PortalActions::take_alert`] call, so callers classify alerts
/// from an explicit optional instead of probing for dialog state.
pub struct BrowserSession {
    page: Page,
    pending_alert: Arc<Mutex<Option<String>>>,
    navigation_timeout: Duration,
}

impl BrowserSession {
    async fn attach(page: Page, navigation_timeout_secs: u64) -> Result<Self> {
        let pending_alert: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let mut dialogs = page.event_listener::<EventJavascriptDialogOpening>().await?;
        let dialog_page = page.clone();
        let dialog_slot = Arc::clone(&pending_alert);
        tokio::spawn(async move {
            while let Some(dialog) = dialogs.next().await {
                tracing::debug!("Dialog opened: {}", dialog.message);
                *dialog_slot.lock().await = Some(dialog.message.clone());
                let params = HandleJavaScriptDialogParams::builder()
                    .accept(true)
                    .build()
                    .expect("accept is set");
                if let Err(e) = dialog_page.execute(params).await {
                    tracing::warn!("Failed to dismiss dialog: {}", e);
                    break;
                }
            }
        });

        Ok(Self {
            page,
            pending_alert,
            navigation_timeout: Duration::from_secs(navigation_timeout_secs),
        })
    }

    async fn find(&self, selector: &str) -> Result<chromiumoxide::Element> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))
    }
}

#[async_trait::async_trait]
impl PortalActions for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let goto = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, BrowserError>(())
        };
        tokio::time::timeout(self.navigation_timeout, goto)
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigating to {url}")))?
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.find(selector).await?.click().await?;
        Ok(())
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.find(selector).await?;
        element.click().await?;
        element.type_str(value).await?;
        Ok(())
    }

    async fn clear_field(&self, selector: &str) -> Result<()> {
        let script = format!("document.querySelector('{selector}').value = ''");
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        // Value assignment alone does not trigger the portal's postback
        // handler; the change event must be dispatched as well.
        let script = format!(
            "{{ const el = document.querySelector('{selector}'); el.value = '{value}'; \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); }}"
        );
        self.page.evaluate(script).await?;
        Ok(())
    }

    async fn element_text(&self, selector: &str) -> Result<String> {
        let element = self.find(selector).await?;
        Ok(element.inner_text().await?.unwrap_or_default())
    }

    async fn element_attr(&self, selector: &str, attr: &str) -> Result<Option<String>> {
        let element = self.find(selector).await?;
        Ok(element.attribute(attr).await?)
    }

    async fn page_content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn take_alert(&self) -> Result<Option<String>> {
        Ok(self.pending_alert.lock().await.take())
    }

    async fn refresh(&self) -> Result<()> {
        self.page.reload().await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Page handles are cheap clones over the same target; closing one
        // closes the tab for all of them.
        self.page.clone().close().await?;
        Ok(())
    }
}
