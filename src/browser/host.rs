use crate::browser::page::{CdpPage, blocking};
use crate::browser::session::BrowserSession;
use crate::error::{BridgeError, Result};
use crate::extractor::agent::AgentTimings;
use crate::extractor::{Extractor, ExtractorRequest, PageAgent};
use crate::metadata::MetadataRecord;
use crate::monitor::{AllowList, BrowserHost, TabId, WindowId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// [`BrowserHost`] backed by a DevTools session
///
/// Extractors are only attached to tabs whose URL passes the allow list, so
/// requests to any other tab fail exactly like a page without the extractor.
pub struct CdpHost {
    session: Arc<BrowserSession>,
    extractor: Arc<Extractor>,
    allow_list: Arc<AllowList>,
    timings: AgentTimings,
    agents: Mutex<HashMap<TabId, AttachedAgent>>,
}

struct AttachedAgent {
    url: String,
    agent: PageAgent<CdpPage>,
}

impl CdpHost {
    pub fn new(
        session: Arc<BrowserSession>,
        extractor: Arc<Extractor>,
        allow_list: Arc<AllowList>,
        timings: AgentTimings,
    ) -> Self {
        Self {
            session,
            extractor,
            allow_list,
            timings,
            agents: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self) -> &Arc<BrowserSession> {
        &self.session
    }

    /// Agent attached to a tab, if any
    pub fn agent(&self, tab_id: &TabId) -> Option<PageAgent<CdpPage>> {
        self.agents
            .lock()
            .ok()
            .and_then(|agents| agents.get(tab_id).map(|attached| attached.agent.clone()))
    }

    /// Attach a fresh agent for the document now loaded in the tab
    ///
    /// Replaces any previous agent, which drops the old document's title state.
    pub async fn attach(&self, tab_id: &TabId, url: &str, title: &str) -> Result<()> {
        if !self.allow_list.is_allowed(url) {
            self.detach(tab_id);
            return Ok(());
        }

        let session = Arc::clone(&self.session);
        let id = tab_id.clone();
        let tab = blocking(move || session.find_tab(&id)).await?;

        let agent = PageAgent::new(Arc::new(CdpPage::new(tab)), Arc::clone(&self.extractor), self.timings, title);
        agent.on_load();

        let previous = self.agents.lock().ok().and_then(|mut agents| {
            agents.insert(
                tab_id.clone(),
                AttachedAgent {
                    url: url.to_string(),
                    agent,
                },
            )
        });
        if let Some(previous) = previous {
            previous.agent.cancel_pending();
        }
        log::debug!("Extractor attached to tab {} ({})", tab_id, url);
        Ok(())
    }

    /// Drop the tab's agent, if any
    pub fn detach(&self, tab_id: &TabId) {
        let removed = self.agents.lock().ok().and_then(|mut agents| agents.remove(tab_id));
        if let Some(removed) = removed {
            removed.agent.cancel_pending();
            log::debug!("Extractor detached from tab {} ({})", tab_id, removed.url);
        }
    }
}

#[async_trait]
impl BrowserHost for CdpHost {
    /// DevTools exposes no window handles; every window resolves to the active tab
    async fn active_tab(&self, _window: &WindowId) -> Result<Option<TabId>> {
        let session = Arc::clone(&self.session);
        let tab = blocking(move || session.get_active_tab()).await?;
        Ok(tab.map(|tab| TabId(tab.get_target_id().to_string())))
    }

    async fn tab_url(&self, tab: &TabId) -> Result<String> {
        let session = Arc::clone(&self.session);
        let id = tab.clone();
        blocking(move || session.find_tab(&id).map(|tab| tab.get_url())).await
    }

    async fn request_metadata(&self, tab: &TabId, request: ExtractorRequest) -> Result<MetadataRecord> {
        let agent = self.agent(tab).ok_or_else(|| BridgeError::ExtractorUnavailable {
            tab: tab.0.clone(),
            reason: "no extractor attached".to_string(),
        })?;

        agent
            .handle_request(request)
            .await
            .map_err(|e| BridgeError::ExtractorUnavailable {
                tab: tab.0.clone(),
                reason: e.to_string(),
            })
    }
}
