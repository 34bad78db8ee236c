// Owned element snapshots handed out by page drivers
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// A CSS locator understood by every driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(css: impl Into<String>) -> Self {
        Self(css.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Parses the locator, logging and returning `None` when it is not valid CSS.
    pub(crate) fn selector(&self) -> Option<Selector> {
        if self.is_empty() {
            return None;
        }
        match Selector::parse(&self.0) {
            Ok(sel) => Some(sel),
            Err(e) => {
                warn!("Invalid locator `{}`: {}", self.0, e);
                None
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Reads either an attribute or the text content of the first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldLocator {
    pub locator: Locator,
    #[serde(default)]
    pub attribute: Option<String>,
}

impl FieldLocator {
    pub fn text(css: &str) -> Self {
        Self {
            locator: Locator::new(css),
            attribute: None,
        }
    }

    pub fn attr(css: &str, attribute: &str) -> Self {
        Self {
            locator: Locator::new(css),
            attribute: Some(attribute.to_string()),
        }
    }
}

/// Opaque handle to one element. Callers read it only through locators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNode {
    fragment: String,
}

impl PageNode {
    pub fn from_html(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
        }
    }

    /// Trimmed text of the first element matching `locator`.
    pub fn text(&self, locator: &Locator) -> Option<String> {
        let sel = locator.selector()?;
        let doc = Html::parse_fragment(&self.fragment);
        doc.select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    }

    pub fn attr(&self, locator: &Locator, name: &str) -> Option<String> {
        let sel = locator.selector()?;
        let doc = Html::parse_fragment(&self.fragment);
        doc.select(&sel)
            .find_map(|el| el.value().attr(name))
            .map(|v| v.trim().to_string())
    }

    /// Attribute values of every match, in document order.
    pub fn attrs(&self, locator: &Locator, name: &str) -> Vec<String> {
        let Some(sel) = locator.selector() else {
            return Vec::new();
        };
        let doc = Html::parse_fragment(&self.fragment);
        doc.select(&sel)
            .filter_map(|el| el.value().attr(name))
            .map(|v| v.trim().to_string())
            .collect()
    }

    pub fn count(&self, locator: &Locator) -> usize {
        let Some(sel) = locator.selector() else {
            return 0;
        };
        let doc = Html::parse_fragment(&self.fragment);
        doc.select(&sel).count()
    }

    pub fn field(&self, field: &FieldLocator) -> Option<String> {
        match &field.attribute {
            Some(name) => self.attr(&field.locator, name),
            None => self.text(&field.locator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REVIEW: &str = r#"<div class="product-review-unit isChecked">
        <span class="name">ab***</span>
        <div class="review-cont"><p>  Lovely texture </p></div>
        <ul class="review-thumb-list"><li><img src="/a.jpg"></li><li><img src="https://cdn.example/b.jpg"></li></ul>
    </div>"#;

    #[test]
    fn reads_text_and_attributes_through_locators() {
        let node = PageNode::from_html(REVIEW);
        assert_eq!(
            node.text(&Locator::new(".review-cont > p")).as_deref(),
            Some("Lovely texture")
        );
        assert_eq!(
            node.attrs(&Locator::new(".review-thumb-list img"), "src"),
            vec!["/a.jpg".to_string(), "https://cdn.example/b.jpg".to_string()]
        );
        assert_eq!(node.count(&Locator::new("li")), 2);
        assert_eq!(node.text(&Locator::new(".date")), None);
    }

    #[test]
    fn invalid_locator_matches_nothing() {
        let node = PageNode::from_html(REVIEW);
        assert_eq!(node.count(&Locator::new("[[[")), 0);
        assert_eq!(node.text(&Locator::new("")), None);
    }
}
