// Category listing harvest: builds a catalog from storefront category pages
use crate::config::AppConfig;
use crate::driver::{DriverFactory, Session};
use crate::model::HarvestError;
use crate::pagination::{ExhaustedBy, PaginationController, RevealLocators};
use crate::parser::{ListingEntry, ListingParser};
use crate::pipeline::with_retries;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

pub struct Harvester<F: DriverFactory> {
    factory: F,
    parser: ListingParser,
    pagination: PaginationController,
    reveal: RevealLocators,
    request_timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
}

impl<F: DriverFactory> Harvester<F> {
    pub fn new(factory: F, config: &AppConfig) -> Self {
        let listing = &config.site.listing;
        Self {
            factory,
            parser: ListingParser::new(listing.clone()),
            pagination: PaginationController::new(&config.pagination)
                .max_iterations(config.pagination.listing_max_iterations),
            reveal: RevealLocators::from(listing),
            request_timeout: config.request_timeout(),
            max_attempts: config.max_attempts,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Collects every listed product across `urls`, first occurrence first.
    /// A category page that keeps failing is logged and left out.
    pub async fn harvest(&self, urls: &[String]) -> Vec<ListingEntry> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for url in urls {
            let label = format!("category {}", url);
            match with_retries(&label, self.max_attempts, self.backoff_base, || {
                self.harvest_page(url)
            })
            .await
            {
                Ok(found) => {
                    info!("Extracted {} products from {}", found.len(), url);
                    for entry in found {
                        let key = (entry.brand.to_lowercase(), entry.product_name.to_lowercase());
                        if seen.insert(key) {
                            entries.push(entry);
                        }
                    }
                }
                Err(e) => warn!("Giving up on {}: {}", url, e),
            }
        }

        entries
    }

    async fn harvest_page(&self, url: &str) -> Result<Vec<ListingEntry>, HarvestError> {
        let session = Session::new(self.factory.open(), self.request_timeout);
        session.goto(url).await?;
        let report = self.pagination.run(&session, &self.reveal).await?;
        if report.exhausted_by == ExhaustedBy::IterationCap {
            warn!(
                "Listing {} hit the {} load cap; later products were not collected",
                url, report.iterations
            );
        }
        info!(
            "Listing {} exhausted by {:?} after {} loads",
            url, report.exhausted_by, report.iterations
        );
        let nodes = session.query(&self.reveal.item).await?;
        Ok(self.parser.parse_all(&nodes))
    }
}
