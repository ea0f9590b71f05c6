use crate::config::ScopeConfig;
use indexmap::IndexSet;

/// Pages the bridge is allowed to read
///
/// Built once at startup and shared read-only by the activity monitor and
/// the page host so the two scope checks can never diverge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    patterns: IndexSet<String>,
}

impl AllowList {
    /// Blank patterns are dropped; duplicates keep their first position
    pub fn new<I, P>(patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.trim().is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(config.allowed_patterns.iter().cloned())
    }

    /// A URL is in scope when any pattern occurs in it
    pub fn is_allowed(&self, url: &str) -> bool {
        !url.is_empty() && self.patterns.iter().any(|pattern| url.contains(pattern.as_str()))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::from_config(&ScopeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns() {
        let allow = AllowList::default();

        assert!(allow.is_allowed("https://splm.sec.samsung.net/record/42"));
        assert!(allow.is_allowed("file:///C:/Users/me/export.html"));
        assert!(allow.is_allowed("http://127.0.0.1:8000/mock.html"));
        assert!(allow.is_allowed("http://localhost:3000/"));
        assert!(!allow.is_allowed("https://google.com"));
        assert!(!allow.is_allowed(""));
    }

    #[test]
    fn test_order_and_dedup() {
        let allow = AllowList::new(["b.example", "a.example", "b.example", "  "]);

        assert_eq!(allow.len(), 2);
        assert_eq!(allow.patterns().collect::<Vec<_>>(), vec!["b.example", "a.example"]);
    }

    #[test]
    fn test_empty_list_allows_nothing() {
        let allow = AllowList::new(Vec::<String>::new());
        assert!(allow.is_empty());
        assert!(!allow.is_allowed("https://splm.sec.samsung.net/"));
    }
}
