use crate::browser::session::{set_tab_title, snapshot_tab};
use crate::error::{BridgeError, Result};
use crate::extractor::{PageSnapshot, PageSurface};
use async_trait::async_trait;
use headless_chrome::Tab;
use std::sync::Arc;

/// A tab's document seen through DevTools
pub struct CdpPage {
    tab: Arc<Tab>,
}

impl CdpPage {
    pub fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }
}

/// Run a blocking DevTools call off the async workers
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BridgeError::TabOperationFailed(format!("DevTools call aborted: {}", e)))?
}

#[async_trait]
impl PageSurface for CdpPage {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        let tab = Arc::clone(&self.tab);
        blocking(move || snapshot_tab(&tab)).await
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let title = title.to_string();
        blocking(move || set_tab_title(&tab, &title)).await
    }
}
