use once_cell::sync::Lazy;
use std::path::PathBuf;

mod error;
pub mod features;
pub mod processed;
pub mod raw;
pub mod record;
pub mod test_data;

pub use error::{DataError, Result};
pub use features::{Extent, Feature, FeatureSet, Geometry, Point};
pub use processed::{DatasetMetadata, DistrictDataset, load_districts};
pub use record::{CensusCode, DistrictRecord, fields};
pub use test_data::{TestDataConfig, create_test_data};

pub const DATA_DIR_DEFAULT: &str = "./zilla_data";

/// Directory for downloaded data, from `ZILLA_DATA_DIR` or `./zilla_data`.
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let dir = std::env::var("ZILLA_DATA_DIR").unwrap_or_else(|_| DATA_DIR_DEFAULT.to_string());
    PathBuf::from(dir)
});

/// Where a session's district records come from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Census table exported to CSV; filtered to district totals
    CensusCsv(PathBuf),
    /// Feature-set JSON saved from a feature service query
    FeatureJson(PathBuf),
    /// Feature-service layer URL, queried for every district
    #[cfg(feature = "download_data")]
    FeatureServer(String),
    /// Built-in synthetic districts
    TestData(TestDataConfig),
}

impl DataSource {
    pub fn name(&self) -> String {
        match self {
            Self::CensusCsv(path) | Self::FeatureJson(path) => path.display().to_string(),
            #[cfg(feature = "download_data")]
            Self::FeatureServer(url) => url.clone(),
            Self::TestData(config) => format!("test_data({})", config.districts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_names() {
        assert_eq!(
            DataSource::CensusCsv(PathBuf::from("census.csv")).name(),
            "census.csv"
        );
        assert_eq!(
            DataSource::TestData(TestDataConfig::minimal()).name(),
            "test_data(4)"
        );
    }
}
