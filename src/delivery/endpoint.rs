use crate::error::{BridgeError, Result};
use std::sync::atomic::{AtomicU16, Ordering};

/// Location of the companion application
///
/// The companion may rebind to any candidate port across restarts, so
/// `current_port` is only the last port known to work.
#[derive(Debug)]
pub struct DeliveryEndpoint {
    host: String,
    port_candidates: Vec<u16>,
    current_port: AtomicU16,
}

impl DeliveryEndpoint {
    /// Candidates are probed in ascending order; the lowest is tried first
    pub fn new(host: impl Into<String>, mut port_candidates: Vec<u16>) -> Result<Self> {
        port_candidates.sort_unstable();
        port_candidates.dedup();
        let first = *port_candidates
            .first()
            .ok_or_else(|| BridgeError::Config("no candidate ports configured".to_string()))?;

        Ok(Self {
            host: host.into(),
            port_candidates,
            current_port: AtomicU16::new(first),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port_candidates(&self) -> &[u16] {
        &self.port_candidates
    }

    pub fn current_port(&self) -> u16 {
        self.current_port.load(Ordering::Relaxed)
    }

    pub fn set_current_port(&self, port: u16) {
        let previous = self.current_port.swap(port, Ordering::Relaxed);
        if previous != port {
            log::info!("Companion port moved from {} to {}", previous, port);
        }
    }

    /// Full URL of `path` on `port`
    pub fn url(&self, port: u16, path: &str) -> String {
        format!("http://{}:{}{}", self.host, port, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_sorted_and_first_is_current() {
        let endpoint = DeliveryEndpoint::new("127.0.0.1", vec![5557, 5555, 5556, 5555]).unwrap();

        assert_eq!(endpoint.port_candidates(), &[5555, 5556, 5557]);
        assert_eq!(endpoint.current_port(), 5555);
    }

    #[test]
    fn test_current_port_persists() {
        let endpoint = DeliveryEndpoint::new("127.0.0.1", vec![5555, 5556]).unwrap();
        endpoint.set_current_port(5556);

        assert_eq!(endpoint.current_port(), 5556);
        assert_eq!(endpoint.url(endpoint.current_port(), "/health"), "http://127.0.0.1:5556/health");
    }

    #[test]
    fn test_empty_candidates_rejected() {
        assert!(DeliveryEndpoint::new("127.0.0.1", Vec::new()).is_err());
    }
}
