//! Title side-channel
//!
//! When the network is unavailable the companion application can still read
//! the current context from the foreground window title. The record is encoded
//! as `[PLM_CTX:<id>|<title>]`, shown for a short time in front of the page's
//! own title, then reverted.

use crate::extractor::agent::PageSurface;
use crate::metadata::MetadataRecord;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

/// Prefix identifying an injected tag
pub const TAG_MARKER: &str = "[PLM_CTX:";

/// Longest identifier carried by a tag, in characters
pub const MAX_ID_CHARS: usize = 30;

/// Longest title carried by a tag, in characters
pub const MAX_TITLE_CHARS: usize = 100;

const UNTITLED: &str = "Untitled";

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[PLM_CTX:([^|]{1,30})\|(.*)\](?:\s|$)").expect("static tag pattern"));

/// Decoded or to-be-emitted title tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleTag {
    pub id: String,
    pub title: String,
}

impl TitleTag {
    /// Tag for a record; `None` when the record carries no identifier
    pub fn for_record(record: &MetadataRecord) -> Option<Self> {
        if record.is_contextless() {
            return None;
        }
        Some(Self {
            id: truncate_chars(record.primary_id(), MAX_ID_CHARS),
            title: sanitize_title(&record.title),
        })
    }

    /// Find a tag at the start of a window or document title
    pub fn parse(window_title: &str) -> Option<Self> {
        let caps = TAG_PATTERN.captures(window_title)?;
        Some(Self {
            id: caps.get(1)?.as_str().to_string(),
            title: caps.get(2)?.as_str().to_string(),
        })
    }

    /// Record carried by the tag; ids starting with `DF` are defect ids
    pub fn into_record(self, url: impl Into<String>) -> MetadataRecord {
        let record = MetadataRecord::new(url).with_title(self.title);
        if self.id.starts_with("DF") {
            record.with_defect_id(self.id)
        } else {
            record.with_plm_id(self.id)
        }
    }
}

impl fmt::Display for TitleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}|{}]", TAG_MARKER, self.id, self.title)
    }
}

/// Swap the tag's delimiters for full-width look-alikes, trim and bound the length
pub fn sanitize_title(raw: &str) -> String {
    let raw = if raw.trim().is_empty() { UNTITLED } else { raw };
    let substituted: String = raw
        .chars()
        .map(|c| match c {
            '[' => '［',
            ']' => '］',
            '|' => '｜',
            other => other,
        })
        .collect();
    truncate_chars(substituted.trim(), MAX_TITLE_CHARS).trim_end().to_string()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Per-document side-channel state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleTagState {
    /// Page title without any injected tag
    pub original_title: String,

    /// Last tag written, for deduplication
    pub last_emitted_tag: String,
}

/// Writes tags into a page title and reverts them
pub struct GhostTitle<S: PageSurface> {
    surface: Arc<S>,
    state: Arc<Mutex<TitleTagState>>,
    revert_delay: Duration,
}

impl<S: PageSurface> GhostTitle<S> {
    pub fn new(surface: Arc<S>, original_title: impl Into<String>, revert_delay: Duration) -> Self {
        Self {
            surface,
            state: Arc::new(Mutex::new(TitleTagState {
                original_title: original_title.into(),
                last_emitted_tag: String::new(),
            })),
            revert_delay,
        }
    }

    /// Current side-channel state
    pub fn state(&self) -> TitleTagState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Title observer: organic title changes become the new original title
    pub fn observe_title(&self, title: &str) {
        if title.contains(TAG_MARKER) {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            if state.original_title != title {
                log::debug!("Page title changed to '{}'", title);
                state.original_title = title.to_string();
            }
        }
    }

    /// Show the record's tag in the page title; returns whether the title was touched
    pub async fn sync(&self, record: &MetadataRecord) -> bool {
        let Some(tag) = TitleTag::for_record(record) else {
            return false;
        };
        let tag = tag.to_string();

        let tagged = {
            let Ok(mut state) = self.state.lock() else {
                return false;
            };
            if state.last_emitted_tag == tag {
                return false;
            }
            state.last_emitted_tag = tag.clone();
            format!("{} {}", tag, state.original_title)
        };

        log::info!("Ghost syncing: {}", tag);
        if let Err(e) = self.surface.set_title(&tagged).await {
            log::warn!("Failed to write title tag: {}", e);
            return false;
        }

        self.schedule_revert();
        true
    }

    /// Restore the original title once the delay elapses
    ///
    /// The title is read when the revert fires, so a change observed in the
    /// meantime is what gets restored.
    fn schedule_revert(&self) {
        let surface = Arc::clone(&self.surface);
        let state = Arc::clone(&self.state);
        let delay = self.revert_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let original = match state.lock() {
                Ok(state) => state.original_title.clone(),
                Err(_) => return,
            };
            if let Err(e) = surface.set_title(&original).await {
                log::debug!("Failed to revert title: {}", e);
            }
        });
    }
}
