use crate::error::Result;

/// The automation-driver capability the scrape engine consumes.
///
/// This is the only way the engine touches the network target. A live
/// implementation wraps one CDP page; tests provide scripted sessions.
#[async_trait::async_trait]
pub trait PortalActions: Send + Sync {
    /// Navigate to a URL and wait for the load to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Type text into a form field by selector
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;

    /// Empty a form field by selector
    async fn clear_field(&self, selector: &str) -> Result<()>;

    /// Set the value of a `<select>` element and fire its change event
    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    /// Extract visible text from an element
    async fn element_text(&self, selector: &str) -> Result<String>;

    /// Read an attribute off an element, if set
    async fn element_attr(&self, selector: &str, attr: &str) -> Result<Option<String>>;

    /// Current page source
    async fn page_content(&self) -> Result<String>;

    /// Take the pending modal alert, if one opened since the last call.
    ///
    /// The alert is dismissed as a side effect; `None` means no alert fired.
    async fn take_alert(&self) -> Result<Option<String>>;

    /// Reload the current page
    async fn refresh(&self) -> Result<()>;

    /// Destroy the underlying session (close the tab)
    async fn close(&self) -> Result<()>;
}
