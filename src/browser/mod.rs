//! Chrome DevTools side of the bridge
//!
//! - [`BrowserSession`]: launch or attach to Chrome/Chromium, list and probe tabs
//! - [`CdpHost`]: the activity monitor's view of that browser
//! - [`CdpPage`]: one tab's document, as seen by its extractor
//! - [`TabWatcher`]: polling loop producing browser events

pub mod config;
pub mod host;
pub mod page;
pub mod session;
pub mod watcher;

pub use config::{ConnectionOptions, LaunchOptions};
pub use host::CdpHost;
pub use page::CdpPage;
pub use session::{BrowserSession, TabProbe};
pub use watcher::{Observation, TabWatcher, WatchState};
