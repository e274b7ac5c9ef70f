use chrono::{DateTime, Utc};
use itertools::Itertools;
use polars::prelude::*;
use serde_json::{Map, Value};
use tracing::{info, info_span, trace, warn};

use super::error::Result;
use crate::{
    DataError, DataSource,
    features::FeatureSet,
    raw,
    record::DistrictRecord,
    test_data::create_test_data,
};

/// District records loaded for one session, plus where they came from.
#[derive(Debug, Clone)]
pub struct DistrictDataset {
    pub records: Vec<DistrictRecord>,
    pub metadata: DatasetMetadata,
}

#[derive(Debug, Clone)]
pub struct DatasetMetadata {
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub rows: usize,
    /// Rows dropped because they lacked a code, name or state, or repeated a
    /// census code already seen
    pub skipped: usize,
}

impl DistrictDataset {
    fn from_parsed(source: String, parsed: Vec<Result<DistrictRecord>>) -> Result<Self> {
        let total = parsed.len();
        let records: Vec<DistrictRecord> = parsed
            .into_iter()
            .filter_map(|record| {
                record
                    .inspect_err(|e| trace!(error = %e, "Skipping row"))
                    .ok()
            })
            .unique_by(|record| record.census_code.clone())
            .collect();

        if records.is_empty() {
            warn!(source = %source, total, "No usable district records");
            return Err(DataError::NoRecords);
        }

        let skipped = total - records.len();
        if skipped > 0 {
            warn!(source = %source, skipped, "Skipped unusable district rows");
        }

        let metadata = DatasetMetadata {
            source,
            loaded_at: Utc::now(),
            rows: records.len(),
            skipped,
        };
        info!(rows = metadata.rows, source = %metadata.source, "Loaded district records");
        Ok(Self { records, metadata })
    }

    /// Records from a collected census frame whose columns are all text.
    pub fn from_census_frame(source: impl Into<String>, df: &DataFrame) -> Result<Self> {
        let columns = df
            .get_columns()
            .iter()
            .map(|column| Ok((column.name().to_string(), column.str()?)))
            .collect::<Result<Vec<_>>>()?;

        let parsed = (0..df.height())
            .map(|row| {
                let attributes: Map<String, Value> = columns
                    .iter()
                    .filter_map(|(name, values)| {
                        values
                            .get(row)
                            .map(|v| (name.clone(), Value::String(v.to_owned())))
                    })
                    .collect();
                DistrictRecord::from_attributes(&attributes)
            })
            .collect();

        Self::from_parsed(source.into(), parsed)
    }

    pub fn from_feature_set(source: impl Into<String>, set: &FeatureSet) -> Result<Self> {
        let parsed = set.features.iter().map(|f| f.to_record()).collect();
        Self::from_parsed(source.into(), parsed)
    }
}

/// Load the session's district records from `source`.
pub fn load_districts(source: &DataSource) -> Result<DistrictDataset> {
    let _span = info_span!("Load districts", source = %source.name()).entered();
    let t_load = std::time::Instant::now();

    let dataset = match source {
        DataSource::CensusCsv(path) => {
            let df = raw::get_census_table_lf(path)?.collect()?;
            DistrictDataset::from_census_frame(source.name(), &df)
        }
        DataSource::FeatureJson(path) => {
            let set = raw::read_feature_set(path)?;
            DistrictDataset::from_feature_set(source.name(), &set)
        }
        #[cfg(feature = "download_data")]
        DataSource::FeatureServer(url) => {
            let file = raw::fetch::download_feature_set(url)?;
            let set = raw::read_feature_set(file.path())?;
            DistrictDataset::from_feature_set(source.name(), &set)
        }
        DataSource::TestData(config) => {
            let (census, _) = create_test_data(config)?;
            let df = raw::get_census_table_lf(census.path())?.collect()?;
            DistrictDataset::from_census_frame(source.name(), &df)
        }
    }?;

    info!(elapsed = ?t_load.elapsed(), "District load complete");
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        features::Feature,
        test_data::{TestDataConfig, create_test_data},
    };

    #[test]
    fn test_census_csv_and_feature_json_agree() {
        let (csv, json) = create_test_data(&TestDataConfig::sample()).unwrap();

        let from_csv = load_districts(&DataSource::CensusCsv(csv.path().to_path_buf())).unwrap();
        let from_json =
            load_districts(&DataSource::FeatureJson(json.path().to_path_buf())).unwrap();

        assert_eq!(from_csv.records.len(), TestDataConfig::sample().districts);
        assert_eq!(from_csv.records.len(), from_json.records.len());
        for (a, b) in from_csv.records.iter().zip(&from_json.records) {
            assert_eq!(a.census_code, b.census_code);
            assert_eq!(a.district_name, b.district_name);
            assert_eq!(a.state_name, b.state_name);
            assert_eq!(a.population, b.population);
        }
    }

    #[test]
    fn test_unknown_population_survives_loading() {
        let dataset = load_districts(&DataSource::TestData(TestDataConfig::sample())).unwrap();
        let nicobars = dataset
            .records
            .iter()
            .find(|r| r.district_name == "Nicobars")
            .unwrap();
        assert_eq!(nicobars.population, None);
        assert_eq!(dataset.metadata.skipped, 0);
        assert_eq!(dataset.metadata.rows, dataset.records.len());
    }

    #[test]
    fn test_duplicate_and_invalid_features_are_skipped() {
        let feature = |value: Value| match value {
            Value::Object(attributes) => Feature::new(attributes, None),
            _ => unreachable!(),
        };
        let set = FeatureSet::new(vec![
            feature(serde_json::json!({"censuscode": 1, "DISTRICT": "A", "ST_NM": "S"})),
            feature(serde_json::json!({"censuscode": 1, "DISTRICT": "A again", "ST_NM": "S"})),
            feature(serde_json::json!({"DISTRICT": "no code", "ST_NM": "S"})),
        ]);

        let dataset = DistrictDataset::from_feature_set("inline", &set).unwrap();
        assert_eq!(dataset.records.len(), 1);
        assert_eq!(dataset.records[0].district_name, "A");
        assert_eq!(dataset.metadata.skipped, 2);
    }

    #[test]
    fn test_empty_feature_set_is_an_error() {
        let err = DistrictDataset::from_feature_set("empty", &FeatureSet::default()).unwrap_err();
        assert!(matches!(err, DataError::NoRecords));
    }
}
