//! Maps catalog names onto products listed by the source's search page.
//!
//! Matching is strict: an exact (case-insensitive) name wins, then substring
//! containment in either direction, and anything else is a `NoMatch`. The
//! resolver never guesses "first result", so reviews are not attached to the
//! wrong product.

use crate::config::{HandleOverride, SearchSelectors, SiteProfile};
use crate::driver::{PageDriver, PageNode, Session, WaitOutcome};
use crate::model::{CatalogEntry, HarvestError, ResolvedProduct, SearchCandidate};
use crate::utils::{collapse_whitespace, resolve_url, sanitize_handle};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use url::form_urlencoded::byte_serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched(ResolvedProduct),
    NoMatch,
}

fn match_key(name: &str) -> String {
    collapse_whitespace(name).to_lowercase()
}

/// Picks the best candidate for `name`; ties go to the first one presented.
pub fn match_candidate<'a>(
    name: &str,
    candidates: &'a [SearchCandidate],
) -> Option<&'a SearchCandidate> {
    let wanted = match_key(name);
    if wanted.is_empty() {
        return None;
    }

    let keyed: Vec<(String, &SearchCandidate)> = candidates
        .iter()
        .map(|c| (match_key(&c.display_name), c))
        .filter(|(k, _)| !k.is_empty())
        .collect();

    keyed
        .iter()
        .find(|(k, _)| *k == wanted)
        .or_else(|| {
            keyed
                .iter()
                .find(|(k, _)| k.contains(&wanted) || wanted.contains(k.as_str()))
        })
        .map(|(_, c)| *c)
}

pub struct ProductResolver {
    origin: Url,
    search_url_template: String,
    selectors: SearchSelectors,
    overrides: HashMap<String, HandleOverride>,
}

impl ProductResolver {
    pub fn new(
        profile: &SiteProfile,
        overrides: &HashMap<String, HandleOverride>,
    ) -> Result<Self, HarvestError> {
        let origin = Url::parse(&profile.origin)
            .map_err(|e| HarvestError::Config(format!("site.origin: {}", e)))?;

        Ok(Self {
            origin,
            search_url_template: profile.search_url_template.clone(),
            selectors: profile.search.clone(),
            overrides: overrides
                .iter()
                .map(|(name, o)| (match_key(name), o.clone()))
                .collect(),
        })
    }

    pub fn search_url(&self, name: &str) -> Result<String, HarvestError> {
        let query: String = byte_serialize(name.trim().as_bytes()).collect();
        let reference = self.search_url_template.replace("{query}", &query);
        resolve_url(&self.origin, &reference)
            .ok_or_else(|| HarvestError::Config(format!("bad search url for '{}'", name)))
    }

    /// Loads the search page for `name` and reads every product card on it.
    pub async fn search_candidates<D: PageDriver>(
        &self,
        session: &Session<D>,
        name: &str,
        wait: Duration,
    ) -> Result<Vec<SearchCandidate>, HarvestError> {
        let url = self.search_url(name)?;
        session.goto(&url).await?;

        if session.wait_for(&self.selectors.results, wait).await == WaitOutcome::TimedOut {
            if session.count(&self.selectors.no_results).await? > 0 {
                debug!("Search for '{}' reported no results", name);
                return Ok(Vec::new());
            }
            return Err(HarvestError::SelectorTimeout {
                locator: self.selectors.results.to_string(),
                timeout: wait,
            });
        }

        let nodes = session.query(&self.selectors.candidate).await?;
        let candidates = self.read_candidates(&nodes);
        debug!("Search for '{}' returned {} candidates", name, candidates.len());
        Ok(candidates)
    }

    /// Cards missing an id or a name cannot be matched and are dropped.
    pub fn read_candidates(&self, nodes: &[PageNode]) -> Vec<SearchCandidate> {
        nodes
            .iter()
            .filter_map(|node| {
                let id = node.field(&self.selectors.candidate_id).filter(|v| !v.is_empty())?;
                let display_name = node
                    .field(&self.selectors.candidate_name)
                    .map(|n| collapse_whitespace(&n))
                    .filter(|v| !v.is_empty())?;
                let encoded_id: String = byte_serialize(id.as_bytes()).collect();
                let detail = self.selectors.detail_url_template.replace("{id}", &encoded_id);
                let detail_url = resolve_url(&self.origin, &detail)?;
                Some(SearchCandidate {
                    id,
                    display_name,
                    detail_url,
                })
            })
            .collect()
    }

    pub fn resolve(&self, entry: &CatalogEntry, candidates: &[SearchCandidate]) -> Resolution {
        let Some(candidate) = match_candidate(&entry.display_name, candidates) else {
            info!(
                "No match for '{}' among {} candidates",
                entry.display_name,
                candidates.len()
            );
            return Resolution::NoMatch;
        };

        let shop = self.overrides.get(&match_key(&entry.display_name));
        let handle = shop
            .map(|o| sanitize_handle(&o.handle))
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| sanitize_handle(&entry.display_name));
        if handle.is_empty() {
            warn!(
                "'{}' matched '{}' but yields no usable handle; recording as unmatched",
                entry.display_name, candidate.display_name
            );
            return Resolution::NoMatch;
        }

        debug!(
            "Resolved '{}' to '{}' ({})",
            entry.display_name, candidate.display_name, candidate.id
        );

        Resolution::Matched(ResolvedProduct {
            product_id: candidate.id.clone(),
            handle,
            canonical_url: candidate.detail_url.clone(),
            source_entry: entry.clone(),
            shop_product_id: shop.and_then(|o| o.product_id.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, name: &str) -> SearchCandidate {
        SearchCandidate {
            id: id.into(),
            display_name: name.into(),
            detail_url: format!("https://global.oliveyoung.com/product/detail?prdtNo={}", id),
        }
    }

    fn resolver() -> ProductResolver {
        let mut overrides = HashMap::new();
        overrides.insert(
            "Sun Stick".to_string(),
            HandleOverride {
                handle: "Green Finger Sun Stick".into(),
                product_id: Some("998877".into()),
            },
        );
        ProductResolver::new(&SiteProfile::default(), &overrides).unwrap()
    }

    #[test]
    fn exact_match_beats_earlier_substring_match() {
        let candidates = vec![
            candidate("1", "Sun Stick Refill Set"),
            candidate("2", "sun stick"),
        ];
        assert_eq!(match_candidate("Sun Stick", &candidates).unwrap().id, "2");
    }

    #[test]
    fn substring_matches_both_directions_first_wins() {
        let candidates = vec![
            candidate("1", "Toner"),
            candidate("2", "Birch Juice Moisturizing Sun Cream SPF50"),
            candidate("3", "Birch Juice Moisturizing Sun Cream Duo"),
        ];
        assert_eq!(
            match_candidate("birch juice moisturizing sun cream", &candidates).unwrap().id,
            "2"
        );
        assert_eq!(
            match_candidate("Daily Hydrating Toner 500ml", &candidates).unwrap().id,
            "1"
        );
    }

    #[test]
    fn no_candidates_is_no_match() {
        let entry = CatalogEntry::new("Nonexistent Product XYZ");
        assert_eq!(resolver().resolve(&entry, &[]), Resolution::NoMatch);
    }

    #[test]
    fn unrelated_candidates_are_not_a_fallback() {
        let entry = CatalogEntry::new("Ghost Product");
        let candidates = vec![candidate("1", "Sun Stick")];
        assert_eq!(resolver().resolve(&entry, &candidates), Resolution::NoMatch);
    }

    #[test]
    fn punctuation_only_name_without_handle_is_no_match() {
        let entry = CatalogEntry::new("+++");
        let candidates = vec![candidate("1", "Sun Stick +++ Duo")];
        assert!(match_candidate("+++", &candidates).is_some());
        assert_eq!(resolver().resolve(&entry, &candidates), Resolution::NoMatch);
    }

    #[test]
    fn override_supplies_handle_and_shop_id() {
        let entry = CatalogEntry::new("sun  stick");
        let Resolution::Matched(product) = resolver().resolve(&entry, &[candidate("A1", "Sun Stick")])
        else {
            panic!("expected a match");
        };
        assert_eq!(product.handle, "green-finger-sun-stick");
        assert_eq!(product.shop_product_id.as_deref(), Some("998877"));
        assert_eq!(product.product_id, "A1");
    }

    #[test]
    fn reads_candidates_from_search_cards() {
        let nodes = vec![
            PageNode::from_html(
                r#"<div class="prdt-unit"><input name="prdtNo" value="GA2301"><input name="prdtName" value=" Sun  Stick "></div>"#,
            ),
            PageNode::from_html(r#"<div class="prdt-unit"><input name="prdtName" value="No Id"></div>"#),
        ];
        assert_eq!(
            resolver().read_candidates(&nodes),
            vec![SearchCandidate {
                id: "GA2301".into(),
                display_name: "Sun Stick".into(),
                detail_url:
                    "https://global.oliveyoung.com/product/detail?prdtNo=GA2301&dataSource=search_result"
                        .into(),
            }]
        );
    }

    #[test]
    fn search_url_encodes_query() {
        assert_eq!(
            resolver().search_url("Sun Stick & Co").unwrap(),
            "https://global.oliveyoung.com/display/search?query=Sun+Stick+%26+Co"
        );
    }
}
