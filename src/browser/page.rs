//! Page metadata and document operations.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::session::Session;

/// Document-level operations on the window's page.
#[derive(Debug, Clone)]
pub struct Page {
    session: Session,
}

impl Page {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }

    /// Returns `document.title`.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error.
    pub async fn title(&self) -> Result<String> {
        let value = self.session.evaluate("document.title").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Returns `location.href`.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error.
    pub async fn url(&self) -> Result<String> {
        let value = self.session.evaluate("location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Evaluates an expression in the page and returns its value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Script`] if the expression threw.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.session.evaluate(expression).await
    }

    /// Reloads the page.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn reload(&self) -> Result<()> {
        self.session.send("Page.reload", json!({})).await?;
        Ok(())
    }

    /// Navigates the main frame.
    ///
    /// The window's navigation policy still applies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NavigationFailed`] if the browser reports an
    /// error text.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result = self.session.send("Page.navigate", json!({ "url": url })).await?;

        if let Some(error_text) = result.get("errorText").and_then(Value::as_str)
            && !error_text.is_empty()
        {
            return Err(Error::navigation_failed(format!("{url}: {error_text}")));
        }

        debug!(url, "Navigated");
        Ok(())
    }

    /// Prints the page to PDF.
    ///
    /// # Errors
    ///
    /// Returns an error if printing fails or the data is not base64.
    pub async fn print_to_pdf(&self) -> Result<Vec<u8>> {
        let result = self.session.send("Page.printToPDF", json!({})).await?;
        let data = result
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::protocol("Expected data in printToPDF response"))?;

        BASE64
            .decode(data)
            .map_err(|e| Error::protocol(format!("Invalid PDF data: {e}")))
    }
}
