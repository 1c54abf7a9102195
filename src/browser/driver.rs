use async_trait::async_trait;

use crate::error::Result;

/// The handful of page interactions the scraper needs.
///
/// Lookups that find nothing return `Ok(false)` rather than an error; `Err`
/// is reserved for a broken browser connection.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    /// Current document as serialized HTML.
    async fn content(&self) -> Result<String>;

    async fn click(&self, selector: &str) -> Result<bool>;

    /// Clears the input matched by `selector` and types `value` into it.
    async fn fill(&self, selector: &str, value: &str) -> Result<bool>;

    /// Clicks the first anchor whose visible text contains `text`.
    async fn click_link_with_text(&self, text: &str) -> Result<bool>;

    async fn shutdown(&mut self) -> Result<()>;
}
