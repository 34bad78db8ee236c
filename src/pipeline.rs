//! Per-product processing and the run loop around it.
//!
//! Each catalog entry goes through resolve → paginate → extract → normalize in
//! its own driver session and ends in exactly one [`ProductOutcome`]. Failures
//! never escape an entry: transient page errors are retried, and whatever is
//! left becomes `Skipped`. Results are folded into the run report in catalog
//! order, so the first-seen rule of the aggregator is deterministic even with
//! several products in flight.

use crate::anonymizer::Anonymizer;
use crate::config::AppConfig;
use crate::driver::{DriverFactory, Session};
use crate::model::{CatalogEntry, HarvestError, ProductOutcome, SkipReason};
use crate::normalizer::Normalizer;
use crate::pagination::{PaginationController, RevealLocators};
use crate::parser::ReviewParser;
use crate::resolver::{ProductResolver, Resolution};
use crate::storage::{Aggregator, StatusRow};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{info, warn};
use url::Url;

/// Runs `op` until it succeeds, fails with a non-retryable error, or runs out of attempts.
pub async fn with_retries<T, Fut>(
    label: &str,
    max_attempts: u32,
    backoff_base: Duration,
    mut op: impl FnMut() -> Fut,
) -> Result<T, HarvestError>
where
    Fut: Future<Output = Result<T, HarvestError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let backoff = backoff_for(backoff_base, attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:.1}s",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    backoff.as_secs_f64()
                );
                sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exponential backoff plus up to 50% random jitter.
fn backoff_for(base: Duration, attempt: u32) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let millis = base_ms.saturating_mul(2u64.pow(attempt.saturating_sub(1).min(6)));
    let jitter = rand::rng().random_range(0..=millis / 2);
    Duration::from_millis(millis.saturating_add(jitter))
}

/// Everything the exporter needs once the run is over.
#[derive(Debug, Default)]
pub struct RunReport {
    pub aggregator: Aggregator,
    pub mismatches: Vec<String>,
    pub statuses: Vec<StatusRow>,
    pub resolved: usize,
    pub skipped: usize,
    pub empty: usize,
}

impl RunReport {
    pub fn record(&mut self, entry: &CatalogEntry, outcome: ProductOutcome) {
        let label = outcome.label().to_string();
        let (detail, reviews) = match outcome {
            ProductOutcome::Resolved { reviews } => {
                self.resolved += 1;
                let found = reviews.len();
                let added = self.aggregator.extend(reviews);
                let detail = if added < found {
                    format!("{} duplicate reviews dropped", found - added)
                } else {
                    String::new()
                };
                (detail, added)
            }
            ProductOutcome::NoMatch => {
                self.mismatches.push(entry.display_name.clone());
                (String::new(), 0)
            }
            ProductOutcome::Skipped { reason } => {
                self.skipped += 1;
                (reason.to_string(), 0)
            }
            ProductOutcome::ExtractionEmpty => {
                self.empty += 1;
                ("no reviews found".to_string(), 0)
            }
        };

        self.statuses.push(StatusRow {
            product_name: entry.display_name.clone(),
            outcome: label,
            detail,
            reviews,
            finished_at: Utc::now(),
        });
    }
}

pub struct Pipeline<F: DriverFactory> {
    factory: F,
    resolver: ProductResolver,
    parser: ReviewParser,
    normalizer: Normalizer,
    pagination: PaginationController,
    reveal: RevealLocators,
    wait_timeout: Duration,
    request_timeout: Duration,
    max_attempts: u32,
    backoff_base: Duration,
    concurrency: usize,
    run_budget: Option<Duration>,
    show_progress: bool,
}

impl<F: DriverFactory> Pipeline<F> {
    pub fn new(factory: F, config: &AppConfig) -> Result<Self, HarvestError> {
        let site = &config.site;
        let origin = Url::parse(&site.origin)
            .map_err(|e| HarvestError::Config(format!("site.origin: {}", e)))?;

        Ok(Self {
            factory,
            resolver: ProductResolver::new(site, &config.handle_overrides)?,
            parser: ReviewParser::new(site.reviews.clone(), config.max_reviews_per_product),
            normalizer: Normalizer::new(
                origin,
                &config.shop_domain,
                Anonymizer::new(&config.anonymizer),
            ),
            pagination: PaginationController::new(&config.pagination)
                .wanting(config.max_reviews_per_product),
            reveal: RevealLocators::from(&site.reviews),
            wait_timeout: config.pagination.wait_timeout(),
            request_timeout: config.request_timeout(),
            max_attempts: config.max_attempts,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            concurrency: config.concurrency.clamp(1, 3),
            run_budget: config.run_budget(),
            show_progress: config.show_progress,
        })
    }

    pub async fn run(&self, catalog: &[CatalogEntry]) -> RunReport {
        let deadline = self.run_budget.map(|b| Instant::now() + b);
        let pb = self.progress_bar(catalog.len());

        info!(
            "Processing {} catalog entries ({} at a time)",
            catalog.len(),
            self.concurrency
        );

        let outcomes: Vec<(&CatalogEntry, ProductOutcome)> = stream::iter(catalog)
            .map(|entry| {
                let pb = pb.clone();
                async move {
                    let outcome = self.process_entry(entry, deadline).await;
                    pb.inc(1);
                    (entry, outcome)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;
        pb.finish_and_clear();

        let mut report = RunReport::default();
        for (entry, outcome) in outcomes {
            report.record(entry, outcome);
        }

        info!(
            "Run finished: {} resolved, {} unmatched, {} empty, {} skipped, {} reviews ({} duplicates dropped)",
            report.resolved,
            report.mismatches.len(),
            report.empty,
            report.skipped,
            report.aggregator.len(),
            report.aggregator.duplicates()
        );
        report
    }

    /// Never fails: every error is turned into an outcome for this entry.
    pub async fn process_entry(
        &self,
        entry: &CatalogEntry,
        deadline: Option<Instant>,
    ) -> ProductOutcome {
        let name = &entry.display_name;
        let work = with_retries(name, self.max_attempts, self.backoff_base, || {
            self.attempt(entry)
        });

        let result = match deadline {
            Some(deadline) if Instant::now() >= deadline => {
                warn!("Run budget spent before '{}' started", name);
                return ProductOutcome::Skipped {
                    reason: SkipReason::BudgetExceeded,
                };
            }
            Some(deadline) => match timeout_at(deadline, work).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Run budget ran out while processing '{}'", name);
                    return ProductOutcome::Skipped {
                        reason: SkipReason::BudgetExceeded,
                    };
                }
            },
            None => work.await,
        };

        match result {
            Ok(outcome) => {
                info!("Finished '{}': {}", name, outcome.label());
                outcome
            }
            Err(e) => {
                warn!("Skipping '{}': {}", name, e);
                ProductOutcome::Skipped {
                    reason: SkipReason::RetriesExhausted(e.to_string()),
                }
            }
        }
    }

    async fn attempt(&self, entry: &CatalogEntry) -> Result<ProductOutcome, HarvestError> {
        info!("Processing product: {}", entry.display_name);
        let session = Session::new(self.factory.open(), self.request_timeout);

        let candidates = self
            .resolver
            .search_candidates(&session, &entry.display_name, self.wait_timeout)
            .await?;
        let product = match self.resolver.resolve(entry, &candidates) {
            Resolution::Matched(product) => product,
            Resolution::NoMatch => return Ok(ProductOutcome::NoMatch),
        };

        session.goto(&product.canonical_url).await?;
        let report = self.pagination.run(&session, &self.reveal).await?;
        info!(
            "Revealed {} reviews for '{}' ({:?} after {} loads)",
            report.records, entry.display_name, report.exhausted_by, report.iterations
        );

        let nodes = session.query(&self.reveal.item).await?;
        let records = self.parser.parse_all(&nodes);
        let reviews = self.normalizer.normalize_all(&product, &records);

        if reviews.is_empty() {
            return Ok(ProductOutcome::ExtractionEmpty);
        }
        Ok(ProductOutcome::Resolved { reviews })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }
}
