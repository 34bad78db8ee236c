// Core structs: catalog entries, candidates, reviews and per-product outcomes
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One product name from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub display_name: String,
}

impl CatalogEntry {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }
}

/// A product card read from the source's search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub id: String,
    pub display_name: String,
    pub detail_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProduct {
    pub product_id: String,
    pub handle: String,
    pub canonical_url: String,
    pub source_entry: CatalogEntry,
    /// Product id in the target shop, when the handle map supplies one.
    pub shop_product_id: Option<String>,
}

/// How the source rendered the star rating of a single review.
#[derive(Debug, Clone, PartialEq)]
pub enum RatingEncoding {
    CountBased {
        filled_count: u32,
        icons_per_full_star: u32,
    },
    PercentageBased {
        pct: f64,
    },
    DualHalfIcon {
        left_filled: u32,
        right_filled: u32,
    },
    /// A rating widget was found but its contents could not be classified.
    Unrecognized {
        raw: String,
    },
}

/// Field bag read from one review node, before any normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReviewRecord {
    pub masked_name: Option<String>,
    pub date_text: Option<String>,
    pub body_text: Option<String>,
    pub rating_encoding: Option<RatingEncoding>,
    pub media_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReview {
    pub review_id: String,
    pub product_handle: String,
    pub product_url: String,
    pub product_id: Option<String>,
    pub body: String,
    pub rating: Option<f64>,
    pub review_date: Option<String>,
    pub reviewer_name: String,
    pub reviewer_email: Option<String>,
    pub picture_urls: Vec<String>,
}

/// Why a catalog entry produced no reviews despite not being a mismatch.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    RetriesExhausted(String),
    BudgetExceeded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::RetriesExhausted(last) => write!(f, "retries exhausted: {}", last),
            SkipReason::BudgetExceeded => write!(f, "budget exceeded"),
        }
    }
}

/// Result of processing one catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductOutcome {
    Resolved { reviews: Vec<NormalizedReview> },
    NoMatch,
    Skipped { reason: SkipReason },
    ExtractionEmpty,
}

impl ProductOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ProductOutcome::Resolved { .. } => "resolved",
            ProductOutcome::NoMatch => "no_match",
            ProductOutcome::Skipped { .. } => "skipped",
            ProductOutcome::ExtractionEmpty => "extraction_empty",
        }
    }
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },
    #[error("timed out after {timeout:?} waiting for `{locator}`")]
    SelectorTimeout { locator: String, timeout: Duration },
    #[error("failed to load catalog {path}: {reason}")]
    CatalogLoad { path: String, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to write {path}: {reason}")]
    ExportWriteFailed { path: String, reason: String },
}

impl HarvestError {
    /// Transient page failures are retried by the pipeline; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HarvestError::NavigationFailed { .. } | HarvestError::SelectorTimeout { .. }
        )
    }
}
