// Catalog and handle-map loading
use crate::config::HandleOverride;
use crate::model::{CatalogEntry, HarvestError};
use crate::utils::collapse_whitespace;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

fn is_csv(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn load_error(path: &Path, reason: impl ToString) -> HarvestError {
    HarvestError::CatalogLoad {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Reads product names in file order, dropping blanks and repeats.
///
/// `.csv` files use the `product_name` column (falling back to `name`, then the
/// first column); anything else is read as one name per line.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>, HarvestError> {
    let names = if is_csv(path) {
        read_csv_column(path)?
    } else {
        fs::read_to_string(path)
            .map_err(|e| load_error(path, e))?
            .lines()
            .map(str::to_string)
            .collect()
    };

    let mut seen = HashSet::new();
    let entries: Vec<CatalogEntry> = names
        .into_iter()
        .map(|n| collapse_whitespace(&n))
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.to_lowercase()))
        .map(CatalogEntry::new)
        .collect();

    info!("Loaded {} catalog entries from {}", entries.len(), path.display());
    Ok(entries)
}

fn read_csv_column(path: &Path) -> Result<Vec<String>, HarvestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| load_error(path, e))?;

    let headers = reader.headers().map_err(|e| load_error(path, e))?.clone();
    let column = find_column(&headers, &["product_name", "name"]).unwrap_or(0);
    debug!("Reading catalog column {} of {}", column, path.display());

    let mut names = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| load_error(path, e))?;
        if let Some(value) = record.get(column) {
            names.push(value.to_string());
        }
    }
    Ok(names)
}

fn find_column(headers: &csv::StringRecord, wanted: &[&str]) -> Option<usize> {
    wanted.iter().find_map(|w| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(w))
    })
}

/// Reads `product_name,product_handle[,product_id]` rows into handle overrides.
pub fn load_handle_map(path: &Path) -> Result<HashMap<String, HandleOverride>, HarvestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| load_error(path, e))?;

    let headers = reader.headers().map_err(|e| load_error(path, e))?.clone();
    let name_col = find_column(&headers, &["product_name", "name"])
        .ok_or_else(|| load_error(path, "missing product_name column"))?;
    let handle_col = find_column(&headers, &["product_handle", "handle"])
        .ok_or_else(|| load_error(path, "missing product_handle column"))?;
    let id_col = find_column(&headers, &["product_id", "id"]);

    let mut overrides = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| load_error(path, e))?;
        let name = record.get(name_col).map(collapse_whitespace).unwrap_or_default();
        let handle = record.get(handle_col).map(str::trim).unwrap_or_default();
        if name.is_empty() || handle.is_empty() {
            continue;
        }
        let product_id = id_col
            .and_then(|c| record.get(c))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        overrides.insert(
            name,
            HandleOverride {
                handle: handle.to_string(),
                product_id,
            },
        );
    }

    info!("Loaded {} handle overrides from {}", overrides.len(), path.display());
    Ok(overrides)
}
