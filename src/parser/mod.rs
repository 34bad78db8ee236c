pub mod listing_parser;
pub mod review_parser;

pub use listing_parser::{ListingEntry, ListingParser};
pub use review_parser::ReviewParser;
