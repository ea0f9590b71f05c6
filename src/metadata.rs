use serde::{Deserialize, Serialize};

/// Identifying metadata of the record shown in a browser tab
///
/// Every field except `url` may be empty: extraction is best-effort and a
/// missing field is not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataRecord {
    /// Identifier of the linked defect-tracking entry
    #[serde(default)]
    pub defect_id: String,

    /// Primary PLM record identifier
    #[serde(default)]
    pub plm_id: String,

    /// Human-readable record or page title
    #[serde(default)]
    pub title: String,

    /// Address of the page the record was taken from
    #[serde(default)]
    pub url: String,
}

impl MetadataRecord {
    /// Create an empty record for the given page
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Builder method: set defect id
    pub fn with_defect_id(mut self, defect_id: impl Into<String>) -> Self {
        self.defect_id = defect_id.into();
        self
    }

    /// Builder method: set PLM id
    pub fn with_plm_id(mut self, plm_id: impl Into<String>) -> Self {
        self.plm_id = plm_id.into();
        self
    }

    /// Builder method: set title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// A record carrying neither identifier
    pub fn is_contextless(&self) -> bool {
        self.defect_id.is_empty() && self.plm_id.is_empty()
    }

    /// Defect id when present, otherwise the PLM id
    pub fn primary_id(&self) -> &str {
        if self.defect_id.is_empty() {
            &self.plm_id
        } else {
            &self.defect_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contextless() {
        let record = MetadataRecord::new("https://example.com").with_title("Only a title");
        assert!(record.is_contextless());
        assert_eq!(record.primary_id(), "");

        let record = record.with_plm_id("P12345-6789");
        assert!(!record.is_contextless());
    }

    #[test]
    fn test_primary_id_prefers_defect() {
        let record = MetadataRecord::new("u").with_plm_id("P12345-6789").with_defect_id("DF-1");
        assert_eq!(record.primary_id(), "DF-1");
    }

    #[test]
    fn test_wire_field_names() {
        let record = MetadataRecord::new("https://splm.sec.samsung.net/r/1").with_plm_id("P123456-7890");
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["defect_id"], "");
        assert_eq!(json["plm_id"], "P123456-7890");
        assert_eq!(json["title"], "");
        assert_eq!(json["url"], "https://splm.sec.samsung.net/r/1");
    }

    #[test]
    fn test_missing_fields_default() {
        let record: MetadataRecord = serde_json::from_str(r#"{"plm_id": "P1"}"#).unwrap();
        assert_eq!(record.plm_id, "P1");
        assert!(record.url.is_empty());
    }
}
