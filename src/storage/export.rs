// Fixed-schema CSV export, written to a temp file and renamed into place
use crate::model::{HarvestError, NormalizedReview};
use crate::parser::ListingEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

pub const EXPORT_HEADER: [&str; 10] = [
    "title",
    "body",
    "rating",
    "review_date",
    "reviewer_name",
    "reviewer_email",
    "product_url",
    "picture_urls",
    "product_id",
    "product_handle",
];

/// One output line. Field order here is the column order of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub title: String,
    pub body: String,
    pub rating: String,
    pub review_date: String,
    pub reviewer_name: String,
    pub reviewer_email: String,
    pub product_url: String,
    pub picture_urls: String,
    pub product_id: String,
    pub product_handle: String,
}

impl From<&NormalizedReview> for ExportRow {
    fn from(r: &NormalizedReview) -> Self {
        Self {
            title: String::new(),
            body: r.body.clone(),
            rating: r.rating.map(|v| format!("{:.1}", v)).unwrap_or_default(),
            review_date: r.review_date.clone().unwrap_or_default(),
            reviewer_name: r.reviewer_name.clone(),
            reviewer_email: r.reviewer_email.clone().unwrap_or_default(),
            product_url: r.product_url.clone(),
            picture_urls: r.picture_urls.join(", "),
            product_id: r.product_id.clone().unwrap_or_default(),
            product_handle: r.product_handle.clone(),
        }
    }
}

/// Per-entry line of the run status report.
#[derive(Debug, Clone)]
pub struct StatusRow {
    pub product_name: String,
    pub outcome: String,
    pub detail: String,
    pub reviews: usize,
    pub finished_at: DateTime<Utc>,
}

/// `reviews.csv` → `reviews.status.csv`
pub fn status_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reviews".into());
    output.with_file_name(format!("{}.status.csv", stem))
}

/// `reviews.csv` → `reviews.mismatches.txt`
pub fn mismatch_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reviews".into());
    output.with_file_name(format!("{}.mismatches.txt", stem))
}

/// Readers of `path` see either the previous file or the complete new one.
fn write_atomically<F>(path: &Path, write: F) -> Result<(), HarvestError>
where
    F: FnOnce(&mut NamedTempFile) -> io::Result<()>,
{
    let fail = |e: &dyn std::fmt::Display| HarvestError::ExportWriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| fail(&e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| fail(&e))?;
    write(&mut tmp).map_err(|e| fail(&e))?;
    tmp.as_file().sync_all().map_err(|e| fail(&e))?;
    tmp.persist(path).map_err(|e| fail(&e.error))?;
    Ok(())
}

pub fn export_reviews(path: &Path, reviews: &[NormalizedReview]) -> Result<usize, HarvestError> {
    write_atomically(path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(EXPORT_HEADER)?;
        for review in reviews {
            writer.serialize(ExportRow::from(review))?;
        }
        writer.flush()
    })?;
    info!("Wrote {} reviews to {}", reviews.len(), path.display());
    Ok(reviews.len())
}

pub fn export_mismatches(path: &Path, names: &[String]) -> Result<(), HarvestError> {
    write_atomically(path, |file| {
        for name in names {
            writeln!(file, "{}", name)?;
        }
        file.flush()
    })?;
    info!("Wrote {} unmatched names to {}", names.len(), path.display());
    Ok(())
}

pub fn export_status(path: &Path, rows: &[StatusRow]) -> Result<(), HarvestError> {
    write_atomically(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(["product_name", "outcome", "detail", "reviews", "finished_at"])?;
        for row in rows {
            let reviews = row.reviews.to_string();
            let finished_at = row.finished_at.to_rfc3339();
            writer.write_record([
                row.product_name.as_str(),
                row.outcome.as_str(),
                row.detail.as_str(),
                reviews.as_str(),
                finished_at.as_str(),
            ])?;
        }
        writer.flush()
    })
}

/// Catalog CSV produced by `harvest`, readable by the catalog loader.
pub fn export_catalog(path: &Path, entries: &[ListingEntry]) -> Result<(), HarvestError> {
    write_atomically(path, |file| {
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(["brand", "product_name"])?;
        for entry in entries {
            writer.write_record([entry.brand.as_str(), entry.product_name.as_str()])?;
        }
        writer.flush()
    })?;
    info!("Wrote {} catalog rows to {}", entries.len(), path.display());
    Ok(())
}
