use crate::model::NormalizedReview;
use std::collections::HashSet;

/// Run-wide review collection, deduplicated on `(product_handle, body)`.
/// The first review seen for a key is kept; later duplicates are dropped.
#[derive(Debug, Default)]
pub struct Aggregator {
    reviews: Vec<NormalizedReview>,
    seen: HashSet<(String, String)>,
    duplicates: usize,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the review duplicates one already held.
    pub fn push(&mut self, review: NormalizedReview) -> bool {
        let key = (review.product_handle.clone(), review.body.clone());
        if !self.seen.insert(key) {
            self.duplicates += 1;
            return false;
        }
        self.reviews.push(review);
        true
    }

    /// Adds every review, returning how many were new.
    pub fn extend(&mut self, reviews: impl IntoIterator<Item = NormalizedReview>) -> usize {
        let mut added = 0;
        for review in reviews {
            if self.push(review) {
                added += 1;
            }
        }
        added
    }

    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn reviews(&self) -> &[NormalizedReview] {
        &self.reviews
    }
}
