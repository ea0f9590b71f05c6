use async_trait::async_trait;
use plm_bridge::config::{DeliveryConfig, ExtractorConfig};
use plm_bridge::extractor::{AgentTimings, PageSnapshot, PageSurface};
use plm_bridge::monitor::{LoadStatus, TabId, WindowId};
use plm_bridge::{
    ActivityMonitor, AllowList, BridgeError, BrowserEvent, BrowserHost, DeliveryPipeline, Extractor, ExtractorRequest,
    MetadataRecord, PageAgent, Result,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLM_URL: &str = "https://splm.sec.samsung.net/record/42";

struct Page {
    snapshot: Mutex<PageSnapshot>,
}

#[async_trait]
impl PageSurface for Page {
    async fn snapshot(&self) -> Result<PageSnapshot> {
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        self.snapshot.lock().unwrap().title = title.to_string();
        Ok(())
    }
}

/// One-window browser with a single tab whose extractor exists only on allowed pages
struct SingleTabBrowser {
    url: Mutex<String>,
    agent: Mutex<Option<PageAgent<Page>>>,
    extractor: Arc<Extractor>,
}

impl SingleTabBrowser {
    fn new() -> Self {
        Self {
            url: Mutex::new(String::new()),
            agent: Mutex::new(None),
            extractor: Arc::new(Extractor::new(&ExtractorConfig::default()).unwrap()),
        }
    }

    fn navigate(&self, url: &str, html: &str, allow_list: &AllowList) {
        *self.url.lock().unwrap() = url.to_string();
        let agent = allow_list.is_allowed(url).then(|| {
            let page = Arc::new(Page {
                snapshot: Mutex::new(PageSnapshot {
                    html: html.to_string(),
                    url: url.to_string(),
                    title: "page".to_string(),
                }),
            });
            PageAgent::new(
                page,
                Arc::clone(&self.extractor),
                AgentTimings::from(&ExtractorConfig::default()),
                "page",
            )
        });
        *self.agent.lock().unwrap() = agent;
    }
}

#[async_trait]
impl BrowserHost for SingleTabBrowser {
    async fn active_tab(&self, _window: &WindowId) -> Result<Option<TabId>> {
        Ok(Some(TabId("1".to_string())))
    }

    async fn tab_url(&self, _tab: &TabId) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn request_metadata(&self, tab: &TabId, request: ExtractorRequest) -> Result<MetadataRecord> {
        let agent = self.agent.lock().unwrap().clone();
        match agent {
            Some(agent) => agent.handle_request(request).await,
            None => Err(BridgeError::ExtractorUnavailable {
                tab: tab.0.clone(),
                reason: "no extractor loaded".to_string(),
            }),
        }
    }
}

#[tokio::test]
async fn test_leaving_allowed_domain_keeps_context() {
    let server = MockServer::start().await;
    let port = server.address().port();
    Mock::given(method("POST"))
        .and(path("/update_context"))
        .and(body_partial_json(json!({"plm_id": "P123456-7890", "url": PLM_URL})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let allow_list = Arc::new(AllowList::default());
    let browser = Arc::new(SingleTabBrowser::new());
    let pipeline = Arc::new(DeliveryPipeline::from_config(&DeliveryConfig::default().ports(port, 1)).unwrap());
    let monitor = ActivityMonitor::new(Arc::clone(&browser), pipeline, Arc::clone(&allow_list));
    let tab = TabId("1".to_string());

    browser.navigate(
        PLM_URL,
        r#"<span id="plm-id-value">P123456-7890</span><h2>Widget Assembly</h2>"#,
        &allow_list,
    );
    monitor.handle(BrowserEvent::TabActivated(tab.clone())).await;

    browser.navigate("https://google.com", "<h1>Search</h1>", &allow_list);
    monitor
        .handle(BrowserEvent::TabUpdated {
            tab: tab.clone(),
            status: LoadStatus::Complete,
        })
        .await;
    monitor
        .handle(BrowserEvent::WindowFocusChanged(Some(WindowId("main".to_string()))))
        .await;

    // Exactly the one update from the allowed page
    server.verify().await;
    assert_eq!(monitor.current_tab(), Some(tab));
}

#[tokio::test]
async fn test_allowed_page_without_extractor_is_skipped() {
    let server = MockServer::start().await;
    let port = server.address().port();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let browser = Arc::new(SingleTabBrowser::new());
    *browser.url.lock().unwrap() = PLM_URL.to_string();

    let pipeline = Arc::new(DeliveryPipeline::from_config(&DeliveryConfig::default().ports(port, 1)).unwrap());
    let monitor = ActivityMonitor::new(browser, pipeline, Arc::new(AllowList::default()));

    monitor.handle(BrowserEvent::TabActivated(TabId("1".to_string()))).await;
    server.verify().await;
}
