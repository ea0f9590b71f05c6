//! Delivery of records to the companion application
//!
//! The companion's port is not fixed, so every delivery goes through a short
//! ladder of strategies:
//!
//! 1. send to the last port known to work;
//! 2. on failure, probe the candidate range with cheap health checks and send
//!    once more to the first live port;
//! 3. when nothing answers, write the record to the file bridge (if enabled),
//!    otherwise rely on the title side-channel alone.
//!
//! There is no queue and no unbounded retry: at most two sends per record.

pub mod endpoint;
pub mod fallback;

pub use endpoint::DeliveryEndpoint;
pub use fallback::FileBridge;

use crate::config::DeliveryConfig;
use crate::error::Result;
use crate::metadata::MetadataRecord;
use crate::monitor::ContextSink;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// How a delivery ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted on the cached port
    Delivered { port: u16 },

    /// Cached port was dead; accepted on a newly discovered one
    Rediscovered { port: u16 },

    /// A live port was found but the retry was not accepted
    Failed { port: u16 },

    /// No live port; record written to the file bridge
    FellBack { path: PathBuf },

    /// No live port and no file bridge; only the title side-channel remains
    TitleOnly,
}

impl DeliveryOutcome {
    /// Whether the companion application acknowledged the record
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. } | DeliveryOutcome::Rediscovered { .. })
    }
}

/// Sends records to the companion, rediscovering its port when needed
#[derive(Debug)]
pub struct DeliveryPipeline {
    client: reqwest::Client,
    endpoint: DeliveryEndpoint,
    update_path: String,
    health_path: String,
    health_timeout: Duration,
    send_timeout: Duration,
    file_bridge: Option<FileBridge>,
}

impl DeliveryPipeline {
    /// Build a pipeline from configuration
    pub fn from_config(config: &DeliveryConfig) -> Result<Self> {
        let endpoint = DeliveryEndpoint::new(config.host.clone(), config.port_candidates())?;

        // Loopback only: a system proxy must never see these requests
        let client = reqwest::Client::builder().no_proxy().build()?;

        Ok(Self {
            client,
            endpoint,
            update_path: config.update_path.clone(),
            health_path: config.health_path.clone(),
            health_timeout: config.health_timeout(),
            send_timeout: config.send_timeout(),
            file_bridge: config.fallback_file.as_ref().map(FileBridge::new),
        })
    }

    pub fn endpoint(&self) -> &DeliveryEndpoint {
        &self.endpoint
    }

    pub fn current_port(&self) -> u16 {
        self.endpoint.current_port()
    }

    /// Deliver one record, degrading step by step
    pub async fn deliver(&self, record: &MetadataRecord) -> DeliveryOutcome {
        let port = self.endpoint.current_port();
        if self.try_send(port, record).await {
            log::info!("Context sent to companion on port {}", port);
            return DeliveryOutcome::Delivered { port };
        }

        log::debug!("Companion not reachable on port {}, scanning", port);
        if let Some(found) = self.scan_for_port().await {
            self.endpoint.set_current_port(found);
            return if self.try_send(found, record).await {
                log::info!("Context sent to companion on rediscovered port {}", found);
                DeliveryOutcome::Rediscovered { port: found }
            } else {
                log::warn!("Companion on port {} is alive but rejected the update", found);
                DeliveryOutcome::Failed { port: found }
            };
        }

        self.fall_back(record).await
    }

    async fn fall_back(&self, record: &MetadataRecord) -> DeliveryOutcome {
        let Some(bridge) = &self.file_bridge else {
            log::info!("Companion not found on any port, relying on title side-channel");
            return DeliveryOutcome::TitleOnly;
        };

        match bridge.write(record).await {
            Ok(_) => DeliveryOutcome::FellBack {
                path: bridge.path().to_path_buf(),
            },
            Err(e) => {
                log::warn!("File bridge write to {} failed: {}", bridge.path().display(), e);
                DeliveryOutcome::TitleOnly
            }
        }
    }

    /// Post the record to `port`; any failure is just `false`
    pub async fn try_send(&self, port: u16, record: &MetadataRecord) -> bool {
        let url = self.endpoint.url(port, &self.update_path);
        match self.client.post(&url).timeout(self.send_timeout).json(record).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                log::debug!("Update on port {} answered {}", port, response.status());
                false
            }
            Err(e) => {
                log::debug!("Update on port {} failed: {}", port, e);
                false
            }
        }
    }

    /// Cheap liveness probe bounded by the health timeout
    pub async fn check_health(&self, port: u16) -> bool {
        let url = self.endpoint.url(port, &self.health_path);
        match self.client.get(&url).timeout(self.health_timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// First candidate port, in ascending order, whose health check passes
    pub async fn scan_for_port(&self) -> Option<u16> {
        for &port in self.endpoint.port_candidates() {
            if self.check_health(port).await {
                log::debug!("Companion found on port {}", port);
                return Some(port);
            }
        }
        None
    }
}

#[async_trait]
impl ContextSink for DeliveryPipeline {
    async fn publish(&self, record: MetadataRecord) {
        let outcome = self.deliver(&record).await;
        log::debug!("Delivery of {} ended with {:?}", record.url, outcome);
    }
}
