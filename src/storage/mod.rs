pub mod aggregator;
pub mod export;

pub use aggregator::Aggregator;
pub use export::{
    export_catalog, export_mismatches, export_reviews, export_status, mismatch_path_for,
    status_path_for, ExportRow, StatusRow, EXPORT_HEADER,
};
