use crate::dom::{Document, inner_text, next_element_sibling, parent_element};
use regex::Regex;
use scraper::Selector;

/// One way of finding a field's value in a document
///
/// Strategies are pure: they read the document and never touch it.
#[derive(Debug, Clone)]
pub enum FieldStrategy {
    /// Known structural locations, tried in order
    Targeted(Vec<Selector>),

    /// Label-like elements whose text names the field; the value sits next to them
    Anchor { labels: Selector, keywords: Vec<String> },

    /// First match of an identifier shape anywhere in the visible text
    Pattern(Regex),

    /// First element matching a heading selector
    Heading(Selector),
}

impl FieldStrategy {
    /// Value found by this strategy, if any
    pub fn apply(&self, doc: &Document) -> Option<String> {
        match self {
            FieldStrategy::Targeted(selectors) => selectors
                .iter()
                .filter_map(|selector| doc.select_first(selector))
                .map(inner_text)
                .find(|text| !text.is_empty()),
            FieldStrategy::Anchor { labels, keywords } => find_value_by_anchor(doc, labels, keywords),
            FieldStrategy::Pattern(pattern) => pattern.find(&doc.body_text()).map(|m| m.as_str().to_string()),
            FieldStrategy::Heading(selector) => doc
                .select_first(selector)
                .map(inner_text)
                .filter(|text| !text.is_empty()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldStrategy::Targeted(_) => "targeted",
            FieldStrategy::Anchor { .. } => "anchor",
            FieldStrategy::Pattern(_) => "pattern",
            FieldStrategy::Heading(_) => "heading",
        }
    }
}

/// Ordered strategies for one field; the first value found wins
#[derive(Debug, Clone, Default)]
pub struct FieldChain {
    strategies: Vec<FieldStrategy>,
}

impl FieldChain {
    pub fn new(strategies: Vec<FieldStrategy>) -> Self {
        Self { strategies }
    }

    pub fn resolve(&self, doc: &Document) -> Option<String> {
        self.strategies.iter().find_map(|strategy| {
            let value = strategy.apply(doc);
            if value.is_some() {
                log::trace!("Field resolved by {} strategy", strategy.name());
            }
            value
        })
    }
}

fn matches_keyword(text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|keyword| text == keyword || text.contains(&format!("{}:", keyword)))
}

/// Scan labels in document order; take the value from the next sibling,
/// else from the parent's next sibling (label cell in its own row)
fn find_value_by_anchor(doc: &Document, labels: &Selector, keywords: &[String]) -> Option<String> {
    for label in doc.select(labels) {
        let text = inner_text(label);
        if !matches_keyword(&text, keywords) {
            continue;
        }

        if let Some(value) = next_element_sibling(label).map(inner_text).filter(|v| !v.is_empty()) {
            return Some(value);
        }

        if let Some(value) = parent_element(label)
            .and_then(next_element_sibling)
            .map(inner_text)
            .filter(|v| !v.is_empty())
        {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_selector;

    fn anchor(keywords: &[&str]) -> FieldStrategy {
        FieldStrategy::Anchor {
            labels: parse_selector("th, td, label, span, .label").unwrap(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn test_targeted_skips_empty_matches() {
        let doc = Document::parse(r#"<body><span id="a">  </span><span id="b">P12345-0001</span></body>"#, "u");
        let strategy = FieldStrategy::Targeted(vec![parse_selector("#a").unwrap(), parse_selector("#b").unwrap()]);

        assert_eq!(strategy.apply(&doc), Some("P12345-0001".to_string()));
    }

    #[test]
    fn test_anchor_next_sibling() {
        let doc = Document::parse(
            "<table><tr><th>결함 ID</th><td>DF-2024-001</td></tr></table>",
            "u",
        );
        assert_eq!(anchor(&["KONA ID", "결함 ID"]).apply(&doc), Some("DF-2024-001".to_string()));
    }

    #[test]
    fn test_anchor_colon_suffix() {
        let doc = Document::parse("<div><label>PLM ID: (read only)</label><span>P22222-3333</span></div>", "u");
        assert_eq!(anchor(&["PLM ID"]).apply(&doc), Some("P22222-3333".to_string()));
    }

    #[test]
    fn test_anchor_parent_sibling() {
        // Label is alone in its row; the value is in the following row
        let doc = Document::parse(
            "<table><tr><td>Defect ID</td></tr><tr><td>KONA-77</td></tr></table>",
            "u",
        );
        assert_eq!(anchor(&["Defect ID"]).apply(&doc), Some("KONA-77".to_string()));
    }

    #[test]
    fn test_anchor_requires_exact_or_colon() {
        let doc = Document::parse("<table><tr><td>Valid ID list</td><td>nope</td></tr></table>", "u");
        assert_eq!(anchor(&["ID"]).apply(&doc), None);
    }

    #[test]
    fn test_anchor_value_with_inline_markup() {
        let doc = Document::parse("<table><tr><th>PLM ID</th><td>P123456-<b>7890</b></td></tr></table>", "u");
        assert_eq!(anchor(&["PLM ID"]).apply(&doc), Some("P123456-7890".to_string()));
    }

    #[test]
    fn test_pattern_across_inline_markup() {
        let doc = Document::parse("<p>Ref <mark>P123456</mark>-7890 here</p>", "u");
        let strategy = FieldStrategy::Pattern(Regex::new(r"P\d{5,6}-\d{4,5}").unwrap());

        assert_eq!(strategy.apply(&doc), Some("P123456-7890".to_string()));
    }

    #[test]
    fn test_pattern_first_match() {
        let doc = Document::parse("<p>see P1234-5678 or P123456-78901 and P654321-1234</p>", "u");
        let strategy = FieldStrategy::Pattern(Regex::new(r"P\d{5,6}-\d{4,5}").unwrap());

        assert_eq!(strategy.apply(&doc), Some("P123456-78901".to_string()));
    }

    #[test]
    fn test_chain_order() {
        let doc = Document::parse(r#"<h1>Heading</h1><div id="t">Targeted</div>"#, "u");
        let chain = FieldChain::new(vec![
            FieldStrategy::Targeted(vec![parse_selector("#t").unwrap()]),
            FieldStrategy::Heading(parse_selector("h1").unwrap()),
        ]);
        assert_eq!(chain.resolve(&doc), Some("Targeted".to_string()));

        let doc = Document::parse("<h1>Heading</h1>", "u");
        assert_eq!(chain.resolve(&doc), Some("Heading".to_string()));
        assert_eq!(FieldChain::default().resolve(&doc), None);
    }
}
