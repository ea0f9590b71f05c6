//! Best-effort metadata extraction
//!
//! Pages have no stable schema: each field is resolved by its own chain of
//! strategies (known selectors, label anchors, headings) and falls back to an
//! identifier pattern over the page text when no identifier was found at all.
//!
//! - [`Extractor`]: pure document → [`MetadataRecord`] function
//! - [`title_tag`]: the `[PLM_CTX:…]` title side-channel
//! - [`agent`]: per-document runtime (initial run, debounced re-runs, requests)

pub mod agent;
pub mod strategy;
pub mod title_tag;

pub use agent::{AgentTimings, PageAgent, PageSnapshot, PageSurface};
pub use strategy::{FieldChain, FieldStrategy};
pub use title_tag::{GhostTitle, TitleTag, TitleTagState};

use crate::config::ExtractorConfig;
use crate::dom::{Document, parse_selector};
use crate::error::Result;
use crate::metadata::MetadataRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Messages the activity monitor sends to a page's extractor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ExtractorRequest {
    GetMetadata,
}

/// Compiled extraction rules
#[derive(Debug, Clone)]
pub struct Extractor {
    defect_id: FieldChain,
    plm_id: FieldChain,
    title: FieldChain,

    /// Used only when neither identifier was found
    id_fallback: FieldStrategy,
}

impl Extractor {
    /// Compile selectors and patterns from configuration
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let labels = parse_selector(&config.label_selector)?;

        let targeted = |selectors: &[String]| -> Result<FieldStrategy> {
            let compiled = selectors
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<Vec<_>>>()?;
            Ok(FieldStrategy::Targeted(compiled))
        };
        let anchor = |keywords: &[String]| FieldStrategy::Anchor {
            labels: labels.clone(),
            keywords: keywords.to_vec(),
        };

        Ok(Self {
            defect_id: FieldChain::new(vec![
                targeted(&config.selectors.defect_id)?,
                anchor(&config.anchors.defect_id),
            ]),
            plm_id: FieldChain::new(vec![targeted(&config.selectors.plm_id)?, anchor(&config.anchors.plm_id)]),
            title: FieldChain::new(vec![
                targeted(&config.selectors.title)?,
                FieldStrategy::Heading(parse_selector(&config.heading_selector)?),
                anchor(&config.anchors.title),
            ]),
            id_fallback: FieldStrategy::Pattern(Regex::new(&config.id_pattern)?),
        })
    }

    /// Extract a record from a parsed document
    ///
    /// Missing fields are empty strings; `url` is always the document's location.
    pub fn extract(&self, doc: &Document) -> MetadataRecord {
        let defect_id = self.defect_id.resolve(doc);
        let mut plm_id = self.plm_id.resolve(doc);

        if defect_id.is_none() && plm_id.is_none() {
            plm_id = self.id_fallback.apply(doc);
        }

        MetadataRecord {
            defect_id: defect_id.unwrap_or_default(),
            plm_id: plm_id.unwrap_or_default(),
            title: self.title.resolve(doc).unwrap_or_default(),
            url: doc.url().to_string(),
        }
    }

    /// Parse `html` and extract a record from it
    pub fn extract_html(&self, html: &str, url: &str) -> MetadataRecord {
        let doc = Document::parse(html, url);
        self.extract(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> Extractor {
        Extractor::new(&ExtractorConfig::default()).unwrap()
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::to_value(ExtractorRequest::GetMetadata).unwrap();
        assert_eq!(json, serde_json::json!({"action": "get_metadata"}));

        let parsed: ExtractorRequest = serde_json::from_str(r#"{"action":"get_metadata"}"#).unwrap();
        assert_eq!(parsed, ExtractorRequest::GetMetadata);
    }

    #[test]
    fn test_mock_page_ids() {
        let html = r#"<body>
            <span id="kona-id-value">KONA-1001</span>
            <span id="plm-id-value">P123456-7890</span>
            <div id="plm-title">Bracket rework</div>
        </body>"#;
        let record = extractor().extract_html(html, "http://localhost:8000/mock.html");

        assert_eq!(record.defect_id, "KONA-1001");
        assert_eq!(record.plm_id, "P123456-7890");
        assert_eq!(record.title, "Bracket rework");
        assert_eq!(record.url, "http://localhost:8000/mock.html");
    }

    #[test]
    fn test_structural_path() {
        let html = r#"<body><div id="content">
            <div><table><tbody><tr>
                <th><strong>P654321-12345</strong></th>
                <th>Housing crack</th>
            </tr></tbody></table></div>
        </div></body>"#;
        let record = extractor().extract_html(html, "https://splm.sec.samsung.net/view");

        assert_eq!(record.plm_id, "P654321-12345");
        assert_eq!(record.title, "Housing crack");
    }

    #[test]
    fn test_localized_anchors() {
        let html = r#"<table>
            <tr><th>등록번호</th><td>P111111-2222</td></tr>
            <tr><th>결함 ID</th><td>DF-9</td></tr>
        </table><h1>제목 없음</h1>"#;
        let record = extractor().extract_html(html, "file:///C:/export.html");

        assert_eq!(record.plm_id, "P111111-2222");
        assert_eq!(record.defect_id, "DF-9");
        assert_eq!(record.title, "제목 없음");
    }

    #[test]
    fn test_pattern_only_when_no_identifier() {
        let html = "<body><p>Related: P222222-3333</p></body>";
        let record = extractor().extract_html(html, "u");
        assert_eq!(record.plm_id, "P222222-3333");

        let html = r#"<body><span id="kona-id-value">KONA-5</span><p>Related: P222222-3333</p></body>"#;
        let record = extractor().extract_html(html, "u");
        assert_eq!(record.defect_id, "KONA-5");
        assert_eq!(record.plm_id, "");
    }

    #[test]
    fn test_nothing_found() {
        let record = extractor().extract_html("<body><p>Nothing here</p></body>", "https://splm.sec.samsung.net/");

        assert!(record.is_contextless());
        assert_eq!(record.title, "");
        assert_eq!(record.url, "https://splm.sec.samsung.net/");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ExtractorConfig::default();
        config.id_pattern = "P(".to_string();
        assert!(Extractor::new(&config).is_err());

        let mut config = ExtractorConfig::default();
        config.selectors.plm_id = vec!["##".to_string()];
        assert!(Extractor::new(&config).is_err());
    }
}
