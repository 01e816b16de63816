//! [`PageDriver`] implementation over the browser tab.

#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, warn};

use super::BrowserFetcher;
use crate::crawler::{Expansion, FetchError, PageDriver, RenderedDocument};

#[cfg(feature = "browser")]
use super::scripts;

#[cfg(feature = "browser")]
impl BrowserFetcher {
    /// Evaluate `script` in the open tab and decode its result.
    async fn eval<T: serde::de::DeserializeOwned>(
        &mut self,
        script: String,
    ) -> Result<T, FetchError> {
        let page = self.page.as_ref().ok_or(FetchError::NoPage)?;
        page.evaluate(script)
            .await
            .map_err(|e| FetchError::Script(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| FetchError::Script(e.to_string()))
    }

    /// Poll for `selector` until it matches or the attempts run out.
    async fn wait_for_ready(&mut self, url: &str, selector: &str) -> Result<(), FetchError> {
        let attempts = self.config.ready_attempts();
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let ready_check = scripts::exists(selector);

        for attempt in 0..attempts {
            match self.eval::<bool>(ready_check.clone()).await {
                Ok(true) => {
                    debug!("Ready marker found on {} after {} polls", url, attempt + 1);
                    return Ok(());
                }
                Ok(false) => {}
                // Evaluation can fail while the document is being replaced
                Err(e) => debug!("Ready check failed on {}: {}", url, e),
            }
            tokio::time::sleep(interval).await;
        }

        Err(FetchError::NotReady {
            url: url.to_string(),
            selector: selector.to_string(),
            waited: interval * attempts as u32,
        })
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageDriver for BrowserFetcher {
    async fn open(
        &mut self,
        url: &str,
        ready_selector: &str,
    ) -> Result<RenderedDocument, FetchError> {
        if self.config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
        }

        let timeout = Duration::from_secs(self.config.timeout);
        let page = self
            .page()
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        debug!("Navigating to {}", url);
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(FetchError::Navigation {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(FetchError::Navigation {
                    url: url.to_string(),
                    reason: format!("timed out after {:?}", timeout),
                })
            }
        }

        self.wait_for_ready(url, ready_selector).await?;

        let mut doc = self.snapshot().await?;
        doc.url = url.to_string();
        Ok(doc)
    }

    async fn expand(&mut self, action: &Expansion) -> Result<bool, FetchError> {
        let script = match action {
            Expansion::Click { selector } => scripts::click_if_actionable(selector),
            Expansion::ScrollTo { anchor } => scripts::scroll_to(anchor),
        };
        self.eval::<bool>(script).await
    }

    async fn count(&mut self, selector: &str) -> Result<usize, FetchError> {
        let n = self.eval::<u64>(scripts::count(selector)).await?;
        Ok(n as usize)
    }

    async fn snapshot(&mut self) -> Result<RenderedDocument, FetchError> {
        let page = self.page.as_ref().ok_or(FetchError::NoPage)?;
        let url = match page.url().await {
            Ok(Some(u)) => u.to_string(),
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Could not read page URL: {}", e);
                String::new()
            }
        };
        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;
        Ok(RenderedDocument { url, html })
    }

    async fn switch_off(&mut self, selector: &str) -> Result<bool, FetchError> {
        self.eval::<bool>(scripts::switch_off(selector)).await
    }

    async fn close(&mut self) {
        BrowserFetcher::close(self).await;
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageDriver for BrowserFetcher {
    async fn open(&mut self, _url: &str, _ready: &str) -> Result<RenderedDocument, FetchError> {
        Err(not_compiled())
    }

    async fn expand(&mut self, _action: &Expansion) -> Result<bool, FetchError> {
        Err(not_compiled())
    }

    async fn count(&mut self, _selector: &str) -> Result<usize, FetchError> {
        Err(not_compiled())
    }

    async fn snapshot(&mut self) -> Result<RenderedDocument, FetchError> {
        Err(not_compiled())
    }

    async fn switch_off(&mut self, _selector: &str) -> Result<bool, FetchError> {
        Err(not_compiled())
    }

    async fn close(&mut self) {}
}

#[cfg(not(feature = "browser"))]
fn not_compiled() -> FetchError {
    FetchError::Browser("browser support not compiled; rebuild with --features browser".into())
}
