//! Layered configuration
//!
//! Configuration is assembled from built-in defaults, then a
//! `settings.default.json` shipped next to the executable, then the user's
//! `settings.json`. Later layers only override the keys they name, nested
//! sections included.

use crate::error::{BridgeError, Result};
use crate::monitor::ScopeMissPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the template settings file looked up next to the executable
pub const DEFAULT_SETTINGS_FILE: &str = "settings.default.json";

/// Name of the user settings file looked up in the working directory
pub const USER_SETTINGS_FILE: &str = "settings.json";

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub scope: ScopeConfig,
    pub delivery: DeliveryConfig,
    pub extractor: ExtractorConfig,
}

/// Which pages the bridge looks at
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScopeConfig {
    /// Substring patterns; a URL is in scope when any of them occurs in it
    pub allowed_patterns: Vec<String>,

    /// What to do when the focused tab is out of scope
    pub on_scope_miss: ScopeMissPolicy,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            allowed_patterns: vec![
                "splm.sec.samsung.net".to_string(),
                "file:///".to_string(),
                "127.0.0.1".to_string(),
                "localhost".to_string(),
            ],
            on_scope_miss: ScopeMissPolicy::Sticky,
        }
    }
}

/// Where and how records are delivered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Host the companion application listens on
    pub host: String,

    /// First port of the candidate range
    pub base_port: u16,

    /// Number of contiguous candidate ports
    pub port_count: u16,

    /// Path receiving record updates
    pub update_path: String,

    /// Path answering liveness probes
    pub health_path: String,

    /// Liveness probe timeout in milliseconds
    pub health_timeout_ms: u64,

    /// Record update timeout in milliseconds
    pub send_timeout_ms: u64,

    /// File overwritten with the latest record when no port answers
    pub fallback_file: Option<PathBuf>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 5555,
            port_count: 10,
            update_path: "/update_context".to_string(),
            health_path: "/health".to_string(),
            health_timeout_ms: 200,
            send_timeout_ms: 2000,
            fallback_file: None,
        }
    }
}

impl DeliveryConfig {
    /// Candidate ports in ascending order
    pub fn port_candidates(&self) -> Vec<u16> {
        (0..self.port_count)
            .filter_map(|offset| self.base_port.checked_add(offset))
            .collect()
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Builder method: set the candidate port range
    pub fn ports(mut self, base_port: u16, port_count: u16) -> Self {
        self.base_port = base_port;
        self.port_count = port_count;
        self
    }

    /// Builder method: enable the file bridge
    pub fn fallback_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_file = Some(path.into());
        self
    }
}

/// Selector lists tried, in order, for each field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FieldSelectors {
    pub defect_id: Vec<String>,
    pub plm_id: Vec<String>,
    pub title: Vec<String>,
}

impl Default for FieldSelectors {
    fn default() -> Self {
        Self {
            defect_id: vec![
                "#content > div.dataGrid.nolist.mgT-1 > table > tbody > tr:nth-child(19) > td > table > tbody > tr > td > a"
                    .to_string(),
                "#kona-id-value".to_string(),
            ],
            plm_id: vec![
                "#content > div:nth-child(1) > table > tbody > tr > th:nth-child(1) > strong".to_string(),
                "#plm-id-value".to_string(),
            ],
            title: vec![
                "#content > div:nth-child(1) > table > tbody > tr > th:nth-child(2)".to_string(),
                "#plm-title".to_string(),
            ],
        }
    }
}

/// Label keywords, localized variants included
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FieldAnchors {
    pub defect_id: Vec<String>,
    pub plm_id: Vec<String>,
    pub title: Vec<String>,
}

impl Default for FieldAnchors {
    fn default() -> Self {
        Self {
            defect_id: vec!["KONA ID".to_string(), "결함 ID".to_string(), "Defect ID".to_string()],
            plm_id: vec!["PLM ID".to_string(), "등록번호".to_string(), "ID".to_string()],
            title: vec!["Title".to_string(), "제목".to_string(), "Subject".to_string()],
        }
    }
}

/// How metadata is read out of a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractorConfig {
    pub selectors: FieldSelectors,
    pub anchors: FieldAnchors,

    /// Elements that may carry a field label
    pub label_selector: String,

    /// Headings used when no title was found
    pub heading_selector: String,

    /// Shape of a PLM identifier in free text
    pub id_pattern: String,

    /// Delay before the first extraction after load, in milliseconds
    pub initial_delay_ms: u64,

    /// Quiet period after the last mutation before re-extracting, in milliseconds
    pub debounce_ms: u64,

    /// How long an injected title tag stays visible, in milliseconds
    pub revert_delay_ms: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            selectors: FieldSelectors::default(),
            anchors: FieldAnchors::default(),
            label_selector: "th, td, label, span, .label".to_string(),
            heading_selector: "h1, h2, .page-title, .title".to_string(),
            id_pattern: r"P\d{5,6}-\d{4,5}".to_string(),
            initial_delay_ms: 1000,
            debounce_ms: 1000,
            revert_delay_ms: 2000,
        }
    }
}

impl ExtractorConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn revert_delay(&self) -> Duration {
        Duration::from_millis(self.revert_delay_ms)
    }
}

impl BridgeConfig {
    /// Load defaults, then the template next to the executable, then the user file
    ///
    /// Missing files are skipped. A file that exists but does not parse is an error.
    pub fn load(user_file: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();

        if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
            layers.push(dir.join(DEFAULT_SETTINGS_FILE));
        }
        layers.push(user_file.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(USER_SETTINGS_FILE)));

        Self::load_layers(&layers)
    }

    /// Merge the given files, in order, over the built-in defaults
    pub fn load_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        for path in paths {
            if !path.exists() {
                log::debug!("Settings layer {} not present, skipping", path.display());
                continue;
            }
            let raw = std::fs::read_to_string(path)?;
            let layer: Value = serde_json::from_str(&raw)
                .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
            merge_values(&mut merged, layer);
            log::debug!("Applied settings layer {}", path.display());
        }

        let config: Self = serde_json::from_value(merged).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.delivery.port_candidates().is_empty() {
            return Err(BridgeError::Config("delivery.port_count must be at least 1".to_string()));
        }
        if self.delivery.host.trim().is_empty() {
            return Err(BridgeError::Config("delivery.host must not be empty".to_string()));
        }
        Ok(())
    }
}

fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_port_candidates() {
        let config = DeliveryConfig::default();
        let ports = config.port_candidates();

        assert_eq!(ports.len(), 10);
        assert_eq!(ports.first(), Some(&5555));
        assert_eq!(ports.last(), Some(&5564));
    }

    #[test]
    fn test_port_candidates_saturate() {
        let config = DeliveryConfig::default().ports(u16::MAX - 1, 5);
        assert_eq!(config.port_candidates(), vec![u16::MAX - 1, u16::MAX]);
    }

    #[test]
    fn test_layers_override_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("settings.default.json");
        let user = dir.path().join("settings.json");

        let mut file = std::fs::File::create(&template).unwrap();
        writeln!(file, r#"{{"delivery": {{"base_port": 6000, "port_count": 3}}}}"#).unwrap();
        let mut file = std::fs::File::create(&user).unwrap();
        writeln!(file, r#"{{"delivery": {{"port_count": 2}}, "scope": {{"on_scope_miss": "clear"}}}}"#).unwrap();

        let config = BridgeConfig::load_layers(&[template, user]).unwrap();

        assert_eq!(config.delivery.port_candidates(), vec![6000, 6001]);
        assert_eq!(config.delivery.host, "127.0.0.1");
        assert_eq!(config.scope.on_scope_miss, ScopeMissPolicy::Clear);
        assert_eq!(config.scope.allowed_patterns.len(), 4);
    }

    #[test]
    fn test_missing_layers_are_skipped() {
        let config = BridgeConfig::load_layers(&[PathBuf::from("/nonexistent/settings.json")]).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_malformed_layer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = BridgeConfig::load_layers(&[path]).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn test_zero_ports_rejected() {
        let mut config = BridgeConfig::default();
        config.delivery.port_count = 0;
        assert!(config.validate().is_err());
    }
}
