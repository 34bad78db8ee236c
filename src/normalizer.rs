use crate::anonymizer::Anonymizer;
use crate::model::{NormalizedReview, RatingEncoding, RawReviewRecord, ResolvedProduct};
use tracing::{debug, warn};
use url::Url;

const MAX_RATING: f64 = 5.0;

/// Maps any detected rating encoding onto the 0..=5 scale. `None` means unknown, never zero.
pub fn normalize_rating(encoding: &RatingEncoding) -> Option<f64> {
    match encoding {
        RatingEncoding::CountBased {
            filled_count,
            icons_per_full_star,
        } => {
            if *icons_per_full_star == 0 {
                warn!("Count-based rating with zero icons per star, treating as unknown");
                return None;
            }
            let stars = f64::from(*filled_count) / f64::from(*icons_per_full_star);
            Some(round_half(stars).min(MAX_RATING))
        }
        RatingEncoding::PercentageBased { pct } => {
            if !pct.is_finite() {
                warn!("Percentage rating is not a number, treating as unknown");
                return None;
            }
            let rating = (pct / 100.0 * MAX_RATING * 10.0).round() / 10.0;
            Some(rating.clamp(0.0, MAX_RATING))
        }
        RatingEncoding::DualHalfIcon {
            left_filled,
            right_filled,
        } => {
            let halves = f64::from(*left_filled) + f64::from(*right_filled);
            Some((halves * 0.5).min(MAX_RATING))
        }
        RatingEncoding::Unrecognized { raw } => {
            warn!("Ambiguous rating encoding `{}`, leaving rating empty", raw);
            None
        }
    }
}

fn round_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

/// Resolves media references to absolute URLs, dropping empties and repeats.
pub fn normalize_media(origin: &Url, refs: &[String]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::with_capacity(refs.len());
    for reference in refs {
        if let Some(url) = crate::utils::resolve_url(origin, reference) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
    }
    urls
}

/// Trims text, keeping `None` for absent fields and `Some("")` for present but blank ones.
pub fn clean_text(text: Option<&str>) -> Option<String> {
    text.map(|t| t.trim().to_string())
}

/// Turns raw field bags into reviews ready for aggregation.
pub struct Normalizer {
    origin: Url,
    shop_domain: String,
    anonymizer: Anonymizer,
}

impl Normalizer {
    pub fn new(origin: Url, shop_domain: &str, anonymizer: Anonymizer) -> Self {
        Self {
            origin,
            shop_domain: shop_domain.trim_end_matches('/').to_string(),
            anonymizer,
        }
    }

    /// Product page in the target shop, or the source page when no shop is configured.
    pub fn product_url(&self, product: &ResolvedProduct) -> String {
        if self.shop_domain.is_empty() {
            product.canonical_url.clone()
        } else {
            format!("{}/products/{}", self.shop_domain, product.handle)
        }
    }

    /// Returns `None` for records without a body; those never reach the export.
    pub fn normalize(
        &self,
        product: &ResolvedProduct,
        index: usize,
        raw: &RawReviewRecord,
    ) -> Option<NormalizedReview> {
        let body = clean_text(raw.body_text.as_deref()).filter(|b| !b.is_empty());
        let Some(body) = body else {
            debug!(
                "Dropping review {} of '{}' with empty body",
                index + 1,
                product.source_entry.display_name
            );
            return None;
        };

        let rating = raw.rating_encoding.as_ref().and_then(normalize_rating);
        let reviewer_name = self
            .anonymizer
            .anonymize(raw.masked_name.as_deref().unwrap_or_default());

        Some(NormalizedReview {
            review_id: format!("{}-{}", product.product_id, index + 1),
            product_handle: product.handle.clone(),
            product_url: self.product_url(product),
            product_id: product.shop_product_id.clone(),
            body,
            rating,
            review_date: clean_text(raw.date_text.as_deref()),
            reviewer_name,
            reviewer_email: None,
            picture_urls: normalize_media(&self.origin, &raw.media_refs),
        })
    }

    pub fn normalize_all(
        &self,
        product: &ResolvedProduct,
        records: &[RawReviewRecord],
    ) -> Vec<NormalizedReview> {
        records
            .iter()
            .enumerate()
            .filter_map(|(i, raw)| self.normalize(product, i, raw))
            .collect()
    }
}
