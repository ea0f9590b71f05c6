use crate::browser::host::CdpHost;
use crate::browser::page::blocking;
use crate::browser::session::{TabProbe, pick_active};
use crate::monitor::{BrowserEvent, LoadStatus, TabId, WindowId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Single pseudo-window: DevTools does not expose window handles
const MAIN_WINDOW: &str = "main";

/// Turns periodic tab probes into browser events and page notifications
pub struct TabWatcher {
    host: Arc<CdpHost>,
    events: mpsc::Sender<BrowserEvent>,
    interval: Duration,
    state: WatchState,
}

/// What the previous poll saw
#[derive(Debug, Default)]
pub struct WatchState {
    active: Option<TabId>,
    any_focused: bool,
    tabs: HashMap<TabId, TabProbe>,
}

/// Reactions derived from comparing two polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Event(BrowserEvent),
    Navigated { tab: TabId, url: String, title: String },
    Mutated(TabId),
    TitleChanged { tab: TabId, title: String },
    Closed(TabId),
}

impl WatchState {
    /// Compare a fresh poll with the previous one and remember it
    pub fn observe(&mut self, probes: Vec<TabProbe>) -> Vec<Observation> {
        let mut out = Vec::new();
        let mut seen = HashMap::new();

        for probe in probes {
            let Some(tab) = probe.tab_id.clone() else {
                continue;
            };

            match self.tabs.get(&tab) {
                None => out.push(Observation::Navigated {
                    tab: tab.clone(),
                    url: probe.url.clone(),
                    title: probe.title.clone(),
                }),
                Some(previous) if previous.url != probe.url => {
                    out.push(Observation::Navigated {
                        tab: tab.clone(),
                        url: probe.url.clone(),
                        title: probe.title.clone(),
                    });
                    if self.active.as_ref() == Some(&tab) && probe.ready {
                        out.push(Observation::Event(BrowserEvent::TabUpdated {
                            tab: tab.clone(),
                            status: LoadStatus::Complete,
                        }));
                    }
                }
                Some(previous) => {
                    if previous.fingerprint() != probe.fingerprint() {
                        out.push(Observation::Mutated(tab.clone()));
                    }
                    if previous.title != probe.title {
                        out.push(Observation::TitleChanged {
                            tab: tab.clone(),
                            title: probe.title.clone(),
                        });
                    }
                    if !previous.ready && probe.ready && self.active.as_ref() == Some(&tab) {
                        out.push(Observation::Event(BrowserEvent::TabUpdated {
                            tab: tab.clone(),
                            status: LoadStatus::Complete,
                        }));
                    }
                }
            }
            seen.insert(tab, probe);
        }

        for gone in self.tabs.keys().filter(|tab| !seen.contains_key(*tab)) {
            out.push(Observation::Closed(gone.clone()));
        }

        let probes: Vec<TabProbe> = seen.values().cloned().collect();
        let any_focused = probes.iter().any(|p| p.focused);
        if any_focused != self.any_focused {
            let window = any_focused.then(|| WindowId(MAIN_WINDOW.to_string()));
            out.push(Observation::Event(BrowserEvent::WindowFocusChanged(window)));
            self.any_focused = any_focused;
        }

        let active = pick_active(&probes);
        if active.is_some() && active != self.active {
            if let Some(tab) = &active {
                out.push(Observation::Event(BrowserEvent::TabActivated(tab.clone())));
            }
            self.active = active;
        }

        self.tabs = seen;
        out
    }
}

impl TabWatcher {
    pub fn new(host: Arc<CdpHost>, events: mpsc::Sender<BrowserEvent>, interval: Duration) -> Self {
        Self {
            host,
            events,
            interval,
            state: WatchState::default(),
        }
    }

    /// Poll until cancelled or until the monitor stops listening
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let session = Arc::clone(self.host.session());
            let probes = match blocking(move || session.probe_tabs()).await {
                Ok(probes) => probes,
                Err(e) => {
                    log::warn!("Tab poll failed: {}", e);
                    continue;
                }
            };

            for observation in self.state.observe(probes) {
                if !self.apply(observation).await {
                    log::debug!("Monitor stopped listening, watcher exiting");
                    return;
                }
            }
        }
    }

    /// Returns false once the event channel is closed
    async fn apply(&self, observation: Observation) -> bool {
        match observation {
            Observation::Event(event) => return self.events.send(event).await.is_ok(),
            Observation::Navigated { tab, url, title } => {
                if let Err(e) = self.host.attach(&tab, &url, &title).await {
                    log::debug!("Could not attach extractor to tab {}: {}", tab, e);
                }
            }
            Observation::Mutated(tab) => {
                if let Some(agent) = self.host.agent(&tab) {
                    agent.on_mutation();
                }
            }
            Observation::TitleChanged { tab, title } => {
                if let Some(agent) = self.host.agent(&tab) {
                    agent.on_title_changed(&title);
                }
            }
            Observation::Closed(tab) => self.host.detach(&tab),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(id: &str, url: &str, focused: bool) -> TabProbe {
        TabProbe {
            tab_id: Some(TabId(id.to_string())),
            url: url.to_string(),
            title: "T".to_string(),
            ready: true,
            visible: focused,
            focused,
            node_count: 10,
            text_length: 100,
        }
    }

    fn events(observations: &[Observation]) -> Vec<BrowserEvent> {
        observations
            .iter()
            .filter_map(|o| match o {
                Observation::Event(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_poll_attaches_and_activates() {
        let mut state = WatchState::default();
        let out = state.observe(vec![probe("1", "file:///a.html", true)]);

        assert!(out.contains(&Observation::Navigated {
            tab: TabId("1".into()),
            url: "file:///a.html".into(),
            title: "T".into(),
        }));
        assert_eq!(
            events(&out),
            vec![
                BrowserEvent::WindowFocusChanged(Some(WindowId("main".into()))),
                BrowserEvent::TabActivated(TabId("1".into())),
            ]
        );
    }

    #[test]
    fn test_navigation_of_active_tab_reports_complete() {
        let mut state = WatchState::default();
        state.observe(vec![probe("1", "file:///a.html", true)]);

        let out = state.observe(vec![probe("1", "file:///b.html", true)]);
        assert_eq!(
            events(&out),
            vec![BrowserEvent::TabUpdated {
                tab: TabId("1".into()),
                status: LoadStatus::Complete,
            }]
        );
    }

    #[test]
    fn test_mutation_title_and_close() {
        let mut state = WatchState::default();
        state.observe(vec![probe("1", "file:///a.html", true), probe("2", "file:///c.html", false)]);

        let mut changed = probe("1", "file:///a.html", true);
        changed.node_count = 11;
        changed.title = "Renamed".to_string();
        let out = state.observe(vec![changed]);

        assert!(out.contains(&Observation::Mutated(TabId("1".into()))));
        assert!(out.contains(&Observation::TitleChanged {
            tab: TabId("1".into()),
            title: "Renamed".into(),
        }));
        assert!(out.contains(&Observation::Closed(TabId("2".into()))));
        assert!(events(&out).is_empty());
    }

    #[test]
    fn test_focus_loss_keeps_active_tab() {
        let mut state = WatchState::default();
        state.observe(vec![probe("1", "file:///a.html", true)]);

        let mut unfocused = probe("1", "file:///a.html", false);
        unfocused.visible = true;
        let out = state.observe(vec![unfocused]);

        assert_eq!(events(&out), vec![BrowserEvent::WindowFocusChanged(None)]);
    }
}
