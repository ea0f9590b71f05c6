use crate::browser::config::{ConnectionOptions, LaunchOptions};
use crate::error::{BridgeError, Result};
use crate::extractor::PageSnapshot;
use crate::monitor::TabId;
use headless_chrome::{Browser, Tab};
use serde::Deserialize;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

/// Cheap per-poll view of a tab
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TabProbe {
    #[serde(skip)]
    pub tab_id: Option<TabId>,
    pub url: String,
    pub title: String,
    pub ready: bool,
    pub visible: bool,
    pub focused: bool,
    pub node_count: u64,
    pub text_length: u64,
}

impl TabProbe {
    /// Changes whenever the document's structure or text changes size
    pub fn fingerprint(&self) -> (u64, u64) {
        (self.node_count, self.text_length)
    }
}

/// Browser session that the bridge watches
pub struct BrowserSession {
    /// The underlying headless_chrome Browser instance
    browser: Browser,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));

        // The user browses in this instance; never close it for inactivity
        launch_opts.idle_browser_timeout = Duration::from_secs(24 * 60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));

        if let Some(path) = options.chrome_path {
            launch_opts.path = Some(path);
        }

        if let Some(dir) = options.user_data_dir {
            launch_opts.user_data_dir = Some(dir);
        }

        launch_opts.sandbox = options.sandbox;

        let browser = Browser::new(launch_opts).map_err(|e| BridgeError::LaunchFailed(e.to_string()))?;

        browser
            .new_tab()
            .map_err(|e| BridgeError::LaunchFailed(format!("Failed to create tab: {}", e)))?;

        Ok(Self { browser })
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser = Browser::connect_with_timeout(options.ws_url, Duration::from_millis(options.timeout))
            .map_err(|e| BridgeError::ConnectionFailed(e.to_string()))?;

        Ok(Self { browser })
    }

    /// Get all tabs
    pub fn get_tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let tabs = self
            .browser
            .get_tabs()
            .lock()
            .map_err(|e| BridgeError::TabOperationFailed(format!("Failed to get tabs: {}", e)))?
            .clone();

        Ok(tabs)
    }

    /// Find a tab by its target id
    pub fn find_tab(&self, tab_id: &TabId) -> Result<Arc<Tab>> {
        self.get_tabs()?
            .into_iter()
            .find(|tab| tab.get_target_id() == &tab_id.0)
            .ok_or_else(|| BridgeError::TabNotFound(tab_id.0.clone()))
    }

    /// Get the currently active tab by checking the document visibility and focus state
    pub fn get_active_tab(&self) -> Result<Option<Arc<Tab>>> {
        let probes = self.probe_tabs()?;
        let tabs = self.get_tabs()?;

        Ok(pick_active(&probes).and_then(|id| tabs.into_iter().find(|tab| tab.get_target_id() == &id.0)))
    }

    /// Probe every tab; tabs that fail to answer are left out
    pub fn probe_tabs(&self) -> Result<Vec<TabProbe>> {
        let js_code = include_str!("probe.js");
        let mut probes = Vec::new();

        for tab in self.get_tabs()? {
            let value = match tab.evaluate(js_code, false) {
                Ok(remote_object) => remote_object.value,
                Err(e) => {
                    log::debug!("Failed to probe tab: {}", e);
                    continue;
                }
            };

            let Some(json_str) = value.as_ref().and_then(|v| v.as_str()) else {
                continue;
            };
            match serde_json::from_str::<TabProbe>(json_str) {
                Ok(mut probe) => {
                    probe.tab_id = Some(TabId(tab.get_target_id().to_string()));
                    probes.push(probe);
                }
                Err(e) => log::debug!("Malformed tab probe: {}", e),
            }
        }

        Ok(probes)
    }
}

/// Focused and visible wins over merely visible
pub fn pick_active(probes: &[TabProbe]) -> Option<TabId> {
    probes
        .iter()
        .find(|p| p.visible && p.focused)
        .or_else(|| probes.iter().find(|p| p.visible))
        .and_then(|p| p.tab_id.clone())
}

/// Markup, location and title of a tab in one round trip
pub fn snapshot_tab(tab: &Tab) -> Result<PageSnapshot> {
    let js_code = include_str!("snapshot.js");

    let result = tab
        .evaluate(js_code, false)
        .map_err(|e| BridgeError::EvaluationFailed(format!("Failed to execute snapshot script: {}", e)))?;

    let json_value = result
        .value
        .ok_or_else(|| BridgeError::EvaluationFailed("No value returned from snapshot".to_string()))?;

    // The script returns a JSON string, so parse it as a string first
    let json_str: String = serde_json::from_value(json_value)?;

    #[derive(Deserialize)]
    struct RawSnapshot {
        html: String,
        url: String,
        title: String,
    }
    let raw: RawSnapshot = serde_json::from_str(&json_str)?;

    Ok(PageSnapshot {
        html: raw.html,
        url: raw.url,
        title: raw.title,
    })
}

/// Replace a tab's document title
pub fn set_tab_title(tab: &Tab, title: &str) -> Result<()> {
    let js_code = format!("document.title = {};", serde_json::to_string(title)?);
    tab.evaluate(&js_code, false)
        .map_err(|e| BridgeError::EvaluationFailed(format!("Failed to set title: {}", e)))?;
    Ok(())
}
