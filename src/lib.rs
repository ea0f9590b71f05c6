//! # plm-bridge
//!
//! Keeps a local companion application's "current context" in sync with the
//! PLM record the user is looking at in the browser.
//!
//! ## How it works
//!
//! - The **activity monitor** follows tab activation, window focus and page
//!   loads. For pages inside the allow list it asks the page's extractor for
//!   metadata; anything else leaves the last context in place.
//! - The **extractor** reads a defect id, a PLM id and a title out of pages
//!   with no stable structure, field by field, through a chain of strategies.
//!   It also writes a short-lived `[PLM_CTX:<id>|<title>]` tag into the page
//!   title that the companion can read without any network.
//! - The **delivery pipeline** posts the record to the companion on its last
//!   known port, rescans the port range when that fails, and falls back to a
//!   file or the title tag when nothing answers.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use plm_bridge::{BridgeConfig, DeliveryPipeline, Extractor};
//!
//! # async fn run() -> plm_bridge::Result<()> {
//! let config = BridgeConfig::default();
//! let extractor = Extractor::new(&config.extractor)?;
//! let record = extractor.extract_html(
//!     r#"<span id="plm-id-value">P123456-7890</span><h2>Widget Assembly</h2>"#,
//!     "https://splm.sec.samsung.net/record/42",
//! );
//!
//! let pipeline = DeliveryPipeline::from_config(&config.delivery)?;
//! let outcome = pipeline.deliver(&record).await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`monitor`]: activity monitor, allow list, browser host trait
//! - [`extractor`]: field strategies, title side-channel, per-page agent
//! - [`delivery`]: port-rediscovering delivery and the file bridge
//! - [`browser`]: DevTools-backed browser host
//! - [`dom`]: read-only HTML document model
//! - [`config`]: layered settings
//! - [`companion`]: reference receiver (requires `companion` feature)

pub mod browser;
pub mod config;
pub mod delivery;
pub mod dom;
pub mod error;
pub mod extractor;
pub mod metadata;
pub mod monitor;

#[cfg(feature = "companion")]
pub mod companion;

pub use browser::{BrowserSession, CdpHost, ConnectionOptions, LaunchOptions, TabWatcher};
pub use config::BridgeConfig;
pub use delivery::{DeliveryEndpoint, DeliveryOutcome, DeliveryPipeline, FileBridge};
pub use dom::Document;
pub use error::{BridgeError, Result};
pub use extractor::{Extractor, ExtractorRequest, PageAgent, TitleTag};
pub use metadata::MetadataRecord;
pub use monitor::{ActivityMonitor, AllowList, BrowserEvent, BrowserHost, ContextSink, ScopeMissPolicy};

#[cfg(feature = "companion")]
pub use companion::ContextStore;
