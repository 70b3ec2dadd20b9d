//! Rendering session abstraction

use crate::{HarvestError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// A scriptable browser tab the discovery loop drives
///
/// Implementations map engine failures to [`crate::HarvestError::Render`].
#[async_trait]
pub trait RenderSession: Send {
    /// Handle to an element of the current document
    type Element: Send + Sync;

    /// Navigates the session to `url`
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Returns every element matching a CSS selector
    async fn query_all(&mut self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Evaluates a script in the page and returns its JSON value
    ///
    /// Scripts that produce no value return `Value::Null`.
    async fn execute_script(&mut self, script: &str) -> Result<serde_json::Value>;

    /// Reads an attribute of an element
    async fn element_attribute(
        &mut self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>>;

    /// Counts elements matching a selector
    async fn count(&mut self, selector: &str) -> Result<usize> {
        Ok(self.query_all(selector).await?.len())
    }
}

/// Bounds one rendering call by `limit`
///
/// An expired call becomes [`HarvestError::Render`], which the discovery
/// loop treats like any other failed round.
pub async fn within<T, F>(limit: Duration, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(HarvestError::Render(format!(
            "{} timed out after {}ms",
            what,
            limit.as_millis()
        ))),
    }
}
