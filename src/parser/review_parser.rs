// Review node → raw field bag
use crate::config::{RatingProbe, ReviewSelectors};
use crate::driver::PageNode;
use crate::model::{RatingEncoding, RawReviewRecord};
use regex::Regex;
use std::sync::LazyLock;

static PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("hardcoded regex pattern is valid")
});

pub struct ReviewParser {
    selectors: ReviewSelectors,
    cap: usize,
}

impl ReviewParser {
    pub fn new(selectors: ReviewSelectors, cap: usize) -> Self {
        Self { selectors, cap }
    }

    /// Reads one review node. Missing fields come back as `None`, never as errors.
    pub fn parse_node(&self, node: &PageNode) -> RawReviewRecord {
        let s = &self.selectors;
        RawReviewRecord {
            masked_name: node.field(&s.name),
            date_text: node.field(&s.date),
            body_text: node.field(&s.body),
            rating_encoding: detect_rating(node, &s.rating_probes),
            media_refs: match &s.media.attribute {
                Some(attr) => node.attrs(&s.media.locator, attr),
                None => node.field(&s.media).into_iter().collect(),
            },
        }
    }

    /// Parses at most `cap` nodes, in the order the page presented them.
    pub fn parse_all(&self, nodes: &[PageNode]) -> Vec<RawReviewRecord> {
        nodes
            .iter()
            .take(self.cap)
            .map(|n| self.parse_node(n))
            .collect()
    }
}

/// The first probe whose container is present decides the encoding.
fn detect_rating(node: &PageNode, probes: &[RatingProbe]) -> Option<RatingEncoding> {
    let probe = probes.iter().find(|p| node.count(p.container()) > 0)?;

    let encoding = match probe {
        RatingProbe::DualHalfIcon {
            left_filled,
            right_filled,
            ..
        } => RatingEncoding::DualHalfIcon {
            left_filled: node.count(left_filled) as u32,
            right_filled: node.count(right_filled) as u32,
        },
        RatingProbe::Percentage { container, value } => {
            let raw = node.field(value);
            match raw.as_deref().and_then(parse_percentage) {
                Some(pct) => RatingEncoding::PercentageBased { pct },
                None => RatingEncoding::Unrecognized {
                    raw: raw
                        .or_else(|| node.text(container))
                        .unwrap_or_default(),
                },
            }
        }
        RatingProbe::Count {
            filled,
            icons_per_full_star,
            ..
        } => RatingEncoding::CountBased {
            filled_count: node.count(filled) as u32,
            icons_per_full_star: *icons_per_full_star,
        },
    };

    Some(encoding)
}

/// Accepts `width: 94%`, `94%` or a bare `94`.
fn parse_percentage(text: &str) -> Option<f64> {
    if let Some(caps) = PERCENT.captures(text) {
        return caps[1].parse().ok();
    }
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
