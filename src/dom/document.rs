use crate::error::{BridgeError, Result};
use scraper::html::Select;
use scraper::{ElementRef, Html, Node, Selector};

/// Tags whose text is never rendered
const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Tags rendered on their own line or cell; inline tags add no break
const BREAK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

/// Read-only snapshot of a rendered page
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
    url: String,
}

impl Document {
    /// Parse a full HTML document taken from the page at `url`
    pub fn parse(html: &str, url: impl Into<String>) -> Self {
        Self {
            html: Html::parse_document(html),
            url: url.into(),
        }
    }

    /// Location of the page this snapshot was taken from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Content of the `<title>` element
    pub fn title(&self) -> String {
        Selector::parse("title")
            .ok()
            .and_then(|selector| self.html.select(&selector).next().map(|el| compact_ws(&el.text().collect::<String>())))
            .unwrap_or_default()
    }

    /// All elements matching `selector`, in document order
    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> Select<'a, 'b> {
        self.html.select(selector)
    }

    /// First element matching `selector`, in document order
    pub fn select_first<'a>(&'a self, selector: &Selector) -> Option<ElementRef<'a>> {
        self.html.select(selector).next()
    }

    /// Visible text of `<body>`, or of the whole document when it has none
    pub fn body_text(&self) -> String {
        let body = Selector::parse("body").ok().and_then(|selector| self.html.select(&selector).next());
        inner_text(body.unwrap_or_else(|| self.html.root_element()))
    }
}

/// Compile a CSS selector, reporting which one failed
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| BridgeError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Rendered text of an element: hidden content skipped, whitespace collapsed
pub fn inner_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(element, &mut out);
    compact_ws(&out)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Node::Text(text) = child.value() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if HIDDEN_TAGS.contains(&name) {
                continue;
            }
            if BREAK_TAGS.contains(&name) {
                out.push(' ');
                collect_text(child, out);
                out.push(' ');
            } else {
                collect_text(child, out);
            }
        }
    }
}

/// Next sibling that is an element, skipping text and comments
pub fn next_element_sibling<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

/// Parent element, if the parent is an element
pub fn parent_element<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.parent().and_then(ElementRef::wrap)
}

pub fn compact_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
