//! Activity monitor
//!
//! Follows which tab the user is looking at and, for tabs inside the allow
//! list, asks the tab's extractor for its metadata and forwards it to a
//! [`ContextSink`]. Every failure on the way (tab gone, extractor not loaded,
//! out-of-scope page) leaves the previously delivered context untouched.

pub mod allow_list;

pub use allow_list::AllowList;

use crate::error::Result;
use crate::extractor::ExtractorRequest;
use crate::metadata::MetadataRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Browser tab handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub String);

/// Browser window handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub String);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Page load progress as reported by the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
}

/// Browser-level events the monitor reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    TabActivated(TabId),

    /// `None` when focus left every browser window
    WindowFocusChanged(Option<WindowId>),

    TabUpdated { tab: TabId, status: LoadStatus },
}

/// Behaviour when the focused tab is outside the allow list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMissPolicy {
    /// Keep the last in-scope context
    #[default]
    Sticky,

    /// Send an identifier-less record so the companion drops its context
    Clear,
}

/// Tab and window queries plus the messaging channel to page extractors
#[async_trait]
pub trait BrowserHost: Send + Sync + 'static {
    /// Active tab of a window, `None` if it has none
    async fn active_tab(&self, window: &WindowId) -> Result<Option<TabId>>;

    /// Current URL of a tab
    async fn tab_url(&self, tab: &TabId) -> Result<String>;

    /// Ask the extractor loaded in `tab`; fails when none is loaded
    async fn request_metadata(&self, tab: &TabId, request: ExtractorRequest) -> Result<MetadataRecord>;
}

/// Receiver of extracted records
#[async_trait]
pub trait ContextSink: Send + Sync + 'static {
    async fn publish(&self, record: MetadataRecord);
}

/// Tracks the current tab and routes extraction results to the sink
pub struct ActivityMonitor<H: BrowserHost, K: ContextSink> {
    host: Arc<H>,
    sink: Arc<K>,
    allow_list: Arc<AllowList>,
    policy: ScopeMissPolicy,
    current_tab: Mutex<Option<TabId>>,
}

impl<H: BrowserHost, K: ContextSink> ActivityMonitor<H, K> {
    pub fn new(host: Arc<H>, sink: Arc<K>, allow_list: Arc<AllowList>) -> Self {
        Self {
            host,
            sink,
            allow_list,
            policy: ScopeMissPolicy::default(),
            current_tab: Mutex::new(None),
        }
    }

    /// Builder method: set the scope-miss policy
    pub fn with_policy(mut self, policy: ScopeMissPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn current_tab(&self) -> Option<TabId> {
        self.current_tab.lock().ok().and_then(|tab| tab.clone())
    }

    fn set_current_tab(&self, tab: &TabId) {
        if let Ok(mut current) = self.current_tab.lock() {
            *current = Some(tab.clone());
        }
    }

    /// Process events until the channel closes
    ///
    /// Each event runs as its own task; a newer event never waits for an
    /// older delivery to settle.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<BrowserEvent>) {
        while let Some(event) = events.recv().await {
            let monitor = Arc::clone(&self);
            tokio::spawn(async move { monitor.handle(event).await });
        }
        log::debug!("Browser event channel closed, monitor stopping");
    }

    pub async fn handle(&self, event: BrowserEvent) {
        match event {
            BrowserEvent::TabActivated(tab) => self.on_tab_activated(tab).await,
            BrowserEvent::WindowFocusChanged(window) => self.on_window_focus_changed(window).await,
            BrowserEvent::TabUpdated { tab, status } => self.on_tab_updated(tab, status).await,
        }
    }

    pub async fn on_tab_activated(&self, tab: TabId) {
        log::debug!("Tab activated: {}", tab);
        self.set_current_tab(&tab);
        self.request_metadata(Some(&tab)).await;
    }

    pub async fn on_window_focus_changed(&self, window: Option<WindowId>) {
        let Some(window) = window else {
            return;
        };

        let tab = match self.host.active_tab(&window).await {
            Ok(Some(tab)) => tab,
            Ok(None) => return,
            Err(e) => {
                log::debug!("Could not resolve active tab of window {}: {}", window, e);
                return;
            }
        };

        log::debug!("Window {} focused, tab {}", window, tab);
        self.set_current_tab(&tab);
        self.request_metadata(Some(&tab)).await;
    }

    pub async fn on_tab_updated(&self, tab: TabId, status: LoadStatus) {
        if status == LoadStatus::Complete && self.current_tab().as_ref() == Some(&tab) {
            self.request_metadata(Some(&tab)).await;
        }
    }

    /// Scope-check the tab, ask its extractor, forward the record
    pub async fn request_metadata(&self, tab: Option<&TabId>) {
        let Some(tab) = tab else {
            return;
        };

        let url = match self.host.tab_url(tab).await {
            Ok(url) => url,
            Err(e) => {
                log::debug!("Could not resolve tab {}: {}", tab, e);
                return;
            }
        };

        if !self.allow_list.is_allowed(&url) {
            match self.policy {
                ScopeMissPolicy::Sticky => {
                    log::debug!("Ignored page outside allow list: {}", url);
                }
                ScopeMissPolicy::Clear => {
                    log::debug!("Page outside allow list, clearing context: {}", url);
                    self.sink.publish(MetadataRecord::new(url)).await;
                }
            }
            return;
        }

        match self.host.request_metadata(tab, ExtractorRequest::GetMetadata).await {
            Ok(record) => {
                log::debug!("Got metadata from tab {}: {:?}", tab, record);
                self.sink.publish(record).await;
            }
            Err(e) => {
                log::debug!("Allowed page but extractor unreachable, keeping context: {}", e);
            }
        }
    }
}
