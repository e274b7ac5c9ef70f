use std::{fs::File, io::BufReader, path::Path};

use polars::prelude::*;
use tracing::{info, instrument, warn};

#[cfg(feature = "download_data")]
pub mod fetch;

use crate::{DataError, features::FeatureSet};
pub use crate::error::Result;

/// Columns a census export must carry for the district-total filter.
pub const REQUIRED_CENSUS_COLUMNS: [&str; 2] = ["type", "total"];

const DISTRICT_LEVEL: &str = "DISTRICT";
const TOTAL_ROWS: &str = "TOTAL";

/// Lazily read a census CSV export and keep only district-level totals.
///
/// Every column is read as text. Header names are trimmed and lowercased so
/// `" Type "` and `TYPE` both become `type`. A row survives when its trimmed,
/// upper-cased `type` is `DISTRICT` and its `total` is `TOTAL`; sub-district
/// rows and the rural/urban splits are dropped.
#[instrument(name = "Read census table", skip_all, level = "info")]
pub fn get_census_table_lf(path: impl AsRef<Path>) -> Result<LazyFrame> {
    let path = path.as_ref();
    info!(path = ?path.file_name(), "Reading census table");

    let mut lf = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?;
    let schema = lf.collect_schema()?;

    let available: Vec<String> = schema
        .iter_names()
        .map(|name| name.trim().to_lowercase())
        .collect();
    let missing: Vec<String> = REQUIRED_CENSUS_COLUMNS
        .iter()
        .filter(|required| !available.iter().any(|name| name == *required))
        .map(ToString::to_string)
        .collect();
    if !missing.is_empty() {
        warn!(?missing, ?available, "Census table is missing required columns");
        return Err(DataError::MissingColumns { missing, available });
    }

    let renamed = schema
        .iter_names()
        .zip(&available)
        .map(|(name, lower)| col(name.clone()).alias(lower.as_str()))
        .collect::<Vec<_>>();

    Ok(lf.select(renamed).filter(
        normalised("type")
            .eq(lit(DISTRICT_LEVEL))
            .and(normalised("total").eq(lit(TOTAL_ROWS))),
    ))
}

fn normalised(column: &str) -> Expr {
    col(column)
        .str()
        .strip_chars(lit(Null {}))
        .str()
        .to_uppercase()
}

/// Read a feature-set JSON document from disk.
#[instrument(name = "Read feature set", skip_all, level = "info")]
pub fn read_feature_set(path: impl AsRef<Path>) -> Result<FeatureSet> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let set: FeatureSet = serde_json::from_reader(reader)?;
    if let Some(error) = set.error {
        return Err(DataError::Service(error.message));
    }
    info!(path = ?path.file_name(), features = set.len(), "Read feature set");
    Ok(set)
}
