// Category listing node → brand and product name
use crate::config::ListingSelectors;
use crate::driver::PageNode;
use crate::utils::collapse_whitespace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub brand: String,
    pub product_name: String,
}

pub struct ListingParser {
    selectors: ListingSelectors,
}

impl ListingParser {
    pub fn new(selectors: ListingSelectors) -> Self {
        Self { selectors }
    }

    /// Cards without a product name are skipped; a missing brand is kept as empty.
    pub fn parse_node(&self, node: &PageNode) -> Option<ListingEntry> {
        let product_name = node
            .field(&self.selectors.name)
            .map(|n| collapse_whitespace(&n))
            .filter(|n| !n.is_empty())?;
        let brand = node
            .field(&self.selectors.brand)
            .map(|b| collapse_whitespace(&b))
            .unwrap_or_default();

        Some(ListingEntry {
            brand,
            product_name,
        })
    }

    pub fn parse_all(&self, nodes: &[PageNode]) -> Vec<ListingEntry> {
        nodes.iter().filter_map(|n| self.parse_node(n)).collect()
    }
}
