use crate::driver::{FieldLocator, Locator};
use crate::model::HarvestError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Target-shop identity for one catalog name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HandleOverride {
    pub handle: String,
    #[serde(default)]
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub max_iterations: u32,
    /// Separate cap for category listings, which are walked to the end.
    pub listing_max_iterations: u32,
    pub settle_ms: u64,
    pub wait_timeout_ms: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            listing_max_iterations: 500,
            settle_ms: 1500,
            wait_timeout_ms: 15_000,
        }
    }
}

impl PaginationConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnonymizerConfig {
    pub seed: u64,
    /// Names used for prefixes missing from the built-in table.
    pub pool: Vec<String>,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            pool: crate::anonymizer::DEFAULT_POOL
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// One way a storefront may render a review's star rating.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RatingProbe {
    DualHalfIcon {
        container: Locator,
        left_filled: Locator,
        right_filled: Locator,
    },
    Percentage {
        container: Locator,
        value: FieldLocator,
    },
    Count {
        container: Locator,
        filled: Locator,
        icons_per_full_star: u32,
    },
}

impl RatingProbe {
    pub fn container(&self) -> &Locator {
        match self {
            RatingProbe::DualHalfIcon { container, .. }
            | RatingProbe::Percentage { container, .. }
            | RatingProbe::Count { container, .. } => container,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSelectors {
    pub results: Locator,
    pub no_results: Locator,
    pub candidate: Locator,
    pub candidate_id: FieldLocator,
    pub candidate_name: FieldLocator,
    /// Relative or absolute; `{id}` is replaced by the candidate id.
    pub detail_url_template: String,
}

impl Default for SearchSelectors {
    fn default() -> Self {
        Self {
            results: Locator::new(".prdt-unit"),
            no_results: Locator::new(".search-none"),
            candidate: Locator::new(".prdt-unit"),
            candidate_id: FieldLocator::attr("input[name=\"prdtNo\"]", "value"),
            candidate_name: FieldLocator::attr("input[name=\"prdtName\"]", "value"),
            detail_url_template: "/product/detail?prdtNo={id}&dataSource=search_result".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReviewSelectors {
    pub container: Locator,
    pub empty: Locator,
    pub item: Locator,
    pub load_more: Locator,
    pub no_more: Locator,
    pub body: FieldLocator,
    pub name: FieldLocator,
    pub date: FieldLocator,
    pub media: FieldLocator,
    pub rating_probes: Vec<RatingProbe>,
}

impl Default for ReviewSelectors {
    fn default() -> Self {
        Self {
            container: Locator::new(".product-review-unit.isChecked"),
            empty: Locator::new(".review-none"),
            item: Locator::new(".product-review-unit.isChecked"),
            load_more: Locator::new(".review-more .btn-more"),
            no_more: Locator::new(".review-more .btn-more.disabled"),
            body: FieldLocator::text(".review-cont > p"),
            name: FieldLocator::text(".name"),
            date: FieldLocator::text(".date"),
            media: FieldLocator::attr(".review-thumb-list img", "src"),
            rating_probes: vec![
                RatingProbe::DualHalfIcon {
                    container: Locator::new(".wrap-icon-star"),
                    left_filled: Locator::new(".wrap-icon-star .icon-star.left.filled"),
                    right_filled: Locator::new(".wrap-icon-star .icon-star.right.filled"),
                },
                RatingProbe::Percentage {
                    container: Locator::new(".star-rating"),
                    value: FieldLocator::attr(".star-rating .fill", "style"),
                },
                RatingProbe::Count {
                    container: Locator::new(".review-stars"),
                    filled: Locator::new(".review-stars .filled"),
                    icons_per_full_star: 1,
                },
            ],
        }
    }
}

/// Category listing pages used by `harvest`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub item: Locator,
    pub brand: FieldLocator,
    pub name: FieldLocator,
    pub load_more: Locator,
    pub no_more: Locator,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item: Locator::new(".prd_info .brand-info"),
            brand: FieldLocator::text("dt"),
            name: FieldLocator::text("dd"),
            load_more: Locator::new(".btn-more"),
            no_more: Locator::new(".btn-more.disabled"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub origin: String,
    /// `{query}` is replaced by the URL-encoded product name.
    pub search_url_template: String,
    pub user_agent: String,
    pub search: SearchSelectors,
    pub reviews: ReviewSelectors,
    pub listing: ListingSelectors,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            origin: "https://global.oliveyoung.com".into(),
            search_url_template: "/display/search?query={query}".into(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) ReviewHarvester/0.1".into(),
            search: SearchSelectors::default(),
            reviews: ReviewSelectors::default(),
            listing: ListingSelectors::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the shop the reviews are imported into.
    pub shop_domain: String,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub request_timeout_secs: u64,
    pub run_budget_secs: Option<u64>,
    pub max_reviews_per_product: usize,
    pub show_progress: bool,
    pub pagination: PaginationConfig,
    pub anonymizer: AnonymizerConfig,
    pub handle_overrides: HashMap<String, HandleOverride>,
    pub site: SiteProfile,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shop_domain: String::new(),
            concurrency: 2,
            max_attempts: 3,
            backoff_base_ms: 2000,
            request_timeout_secs: 30,
            run_budget_secs: None,
            max_reviews_per_product: 10,
            show_progress: true,
            pagination: PaginationConfig::default(),
            anonymizer: AnonymizerConfig::default(),
            handle_overrides: HashMap::new(),
            site: SiteProfile::default(),
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn run_budget(&self) -> Option<Duration> {
        self.run_budget_secs.map(Duration::from_secs)
    }

    /// Clamps tunables into their supported ranges and rejects unusable values.
    pub fn validate(mut self) -> Result<Self, HarvestError> {
        self.concurrency = self.concurrency.clamp(1, 3);
        self.max_attempts = self.max_attempts.max(1);
        self.shop_domain = self.shop_domain.trim().trim_end_matches('/').to_string();

        if url::Url::parse(&self.site.origin).is_err() {
            return Err(HarvestError::Config(format!(
                "site.origin is not an absolute URL: {}",
                self.site.origin
            )));
        }
        if !self.site.search_url_template.contains("{query}") {
            return Err(HarvestError::Config(
                "site.search_url_template must contain {query}".into(),
            ));
        }
        if self.anonymizer.pool.is_empty() {
            return Err(HarvestError::Config("anonymizer.pool must not be empty".into()));
        }
        Ok(self)
    }
}

pub fn load_config(path: &Path) -> Result<AppConfig, HarvestError> {
    let content = fs::read_to_string(path)
        .map_err(|e| HarvestError::Config(format!("{}: {}", path.display(), e)))?;
    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| HarvestError::Config(format!("{}: {}", path.display(), e)))?;
    config.validate()
}
