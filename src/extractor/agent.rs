use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::extractor::title_tag::{GhostTitle, TitleTagState};
use crate::extractor::{Extractor, ExtractorRequest};
use crate::metadata::MetadataRecord;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What an agent reads from its page in one go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub html: String,
    pub url: String,
    pub title: String,
}

/// Access to one loaded document
#[async_trait]
pub trait PageSurface: Send + Sync + 'static {
    /// Current markup, location and title
    async fn snapshot(&self) -> Result<PageSnapshot>;

    /// Replace the document's visible title
    async fn set_title(&self, title: &str) -> Result<()>;
}

/// Timings driving an agent's self-triggered runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTimings {
    pub initial_delay: Duration,
    pub debounce: Duration,
    pub revert_delay: Duration,
}

impl From<&ExtractorConfig> for AgentTimings {
    fn from(config: &ExtractorConfig) -> Self {
        Self {
            initial_delay: config.initial_delay(),
            debounce: config.debounce(),
            revert_delay: config.revert_delay(),
        }
    }
}

/// Extractor bound to a single document
///
/// Lives as long as the document: a navigation gets a fresh agent and with it
/// fresh title side-channel state.
pub struct PageAgent<S: PageSurface> {
    inner: Arc<AgentInner<S>>,
}

struct AgentInner<S: PageSurface> {
    surface: Arc<S>,
    extractor: Arc<Extractor>,
    ghost: GhostTitle<S>,
    timings: AgentTimings,

    /// At most one debounced run is pending
    pending: Mutex<Option<CancellationToken>>,
}

impl<S: PageSurface> Clone for PageAgent<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PageSurface> PageAgent<S> {
    pub fn new(surface: Arc<S>, extractor: Arc<Extractor>, timings: AgentTimings, original_title: impl Into<String>) -> Self {
        let ghost = GhostTitle::new(Arc::clone(&surface), original_title, timings.revert_delay);
        Self {
            inner: Arc::new(AgentInner {
                surface,
                extractor,
                ghost,
                timings,
                pending: Mutex::new(None),
            }),
        }
    }

    /// Answer a request from the activity monitor
    pub async fn handle_request(&self, request: ExtractorRequest) -> Result<MetadataRecord> {
        match request {
            ExtractorRequest::GetMetadata => self.run_once().await,
        }
    }

    /// Extract from a fresh snapshot and refresh the title side-channel
    pub async fn run_once(&self) -> Result<MetadataRecord> {
        let snapshot = self.inner.surface.snapshot().await?;
        let record = self.inner.extractor.extract_html(&snapshot.html, &snapshot.url);
        log::debug!(
            "Extracted defect='{}' plm='{}' title='{}' from {}",
            record.defect_id,
            record.plm_id,
            record.title,
            record.url
        );

        self.inner.ghost.sync(&record).await;
        Ok(record)
    }

    /// Schedule the first extraction after the document loaded
    pub fn on_load(&self) {
        let agent = self.clone();
        let delay = self.inner.timings.initial_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = agent.run_once().await {
                log::debug!("Initial extraction failed: {}", e);
            }
        });
    }

    /// Document changed: restart the quiet-period timer
    pub fn on_mutation(&self) {
        let token = CancellationToken::new();
        {
            let Ok(mut pending) = self.inner.pending.lock() else {
                return;
            };
            if let Some(previous) = pending.replace(token.clone()) {
                previous.cancel();
            }
        }

        let agent = self.clone();
        let debounce = self.inner.timings.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(debounce) => {
                    if let Err(e) = agent.run_once().await {
                        log::debug!("Debounced extraction failed: {}", e);
                    }
                }
            }
        });
    }

    /// Title observer hook
    pub fn on_title_changed(&self, title: &str) {
        self.inner.ghost.observe_title(title);
    }

    pub fn title_state(&self) -> TitleTagState {
        self.inner.ghost.state()
    }

    /// Stop any pending debounced run
    pub fn cancel_pending(&self) {
        if let Ok(mut pending) = self.inner.pending.lock() {
            if let Some(token) = pending.take() {
                token.cancel();
            }
        }
    }
}
