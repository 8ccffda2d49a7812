//! Node type filter applied while serializing a subtree.
//!
//! Syntax: comma-separated node type names, `!` excludes a type.
//! `Site:Page,Site:Text` keeps pages and texts, `!Site:Shortcut` keeps
//! everything but shortcuts.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTypeFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl NodeTypeFilter {
    pub fn parse(input: &str) -> Self {
        let mut filter = Self::default();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.strip_prefix('!') {
                Some(negated) if !negated.trim().is_empty() => {
                    filter.exclude.push(negated.trim().to_string())
                }
                Some(_) => {}
                None => filter.include.push(part.to_string()),
            }
        }
        filter
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, node_type: &str) -> bool {
        if self.exclude.iter().any(|t| t == node_type) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|t| t == node_type)
    }
}

impl FromStr for NodeTypeFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for NodeTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .include
            .iter()
            .cloned()
            .chain(self.exclude.iter().map(|t| format!("!{}", t)))
            .collect();
        f.write_str(&parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_only() {
        let filter = NodeTypeFilter::parse("Site:Page, Site:Text");
        assert!(filter.matches("Site:Page"));
        assert!(filter.matches("Site:Text"));
        assert!(!filter.matches("Site:Image"));
    }

    #[test]
    fn test_exclude_only() {
        let filter = NodeTypeFilter::parse("!Site:Shortcut");
        assert!(filter.matches("Site:Page"));
        assert!(!filter.matches("Site:Shortcut"));
    }

    #[test]
    fn test_exclude_wins() {
        let filter = NodeTypeFilter::parse("Site:Page,!Site:Page");
        assert!(!filter.matches("Site:Page"));
    }

    #[test]
    fn test_display_and_empty() {
        assert!(NodeTypeFilter::parse(" , ,!").is_empty());
        let filter = NodeTypeFilter::parse("A,!B");
        assert_eq!(filter.to_string(), "A,!B");
    }
}
