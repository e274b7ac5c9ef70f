use std::io::Write;

use serde_json::{Value, json};
use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of districts to emit (capped at the size of the built-in table)
    pub districts: usize,
    /// Whether to add rural/urban split rows and sub-district rows that the
    /// census filter must drop
    pub include_non_total_rows: bool,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self::sample()
    }
}

impl TestDataConfig {
    /// Pune, Puri, Mumbai and Thiruvananthapuram
    pub fn minimal() -> Self {
        Self {
            districts: 4,
            include_non_total_rows: true,
        }
    }

    /// Every district in the built-in table
    pub fn sample() -> Self {
        Self {
            districts: DISTRICTS.len(),
            include_non_total_rows: true,
        }
    }

    fn rows(&self) -> &'static [DistrictRow] {
        &DISTRICTS[..self.districts.min(DISTRICTS.len())]
    }
}

// (census code, district, state, population, males, females, households, density)
type DistrictRow = (
    u32,
    &'static str,
    &'static str,
    Option<u64>,
    u64,
    u64,
    u64,
    f64,
);

const DISTRICTS: [DistrictRow; 22] = [
    (521, "Pune", "Maharashtra", Some(9_429_408), 4_924_105, 4_505_303, 2_138_250, 603.0),
    (392, "Puri", "Odisha", Some(1_698_730), 865_209, 833_521, 398_396, 488.0),
    (518, "Mumbai", "Maharashtra", Some(3_085_411), 1_684_608, 1_400_803, 663_926, 20_634.0),
    (601, "Thiruvananthapuram", "Kerala", Some(3_301_427), 1_581_678, 1_719_749, 847_714, 1_509.0),
    (595, "Ernakulam", "Kerala", Some(3_282_388), 1_619_557, 1_662_831, 850_236, 1_072.0),
    (589, "Kozhikode", "Kerala", Some(3_086_293), 1_470_942, 1_615_351, 707_812, 1_316.0),
    (572, "Bengaluru Urban", "Karnataka", Some(9_621_551), 5_022_661, 4_598_890, 2_393_845, 4_381.0),
    (603, "Chennai", "Tamil Nadu", Some(4_646_732), 2_335_844, 2_310_888, 1_154_982, 26_553.0),
    (632, "Coimbatore", "Tamil Nadu", Some(3_458_045), 1_729_297, 1_728_748, 961_282, 731.0),
    (342, "Kolkata", "West Bengal", Some(4_496_694), 2_356_766, 2_139_928, 1_024_928, 24_306.0),
    (358, "Puruliya", "West Bengal", Some(2_930_115), 1_496_996, 1_433_119, 600_221, 468.0),
    (157, "Lucknow", "Uttar Pradesh", Some(4_589_838), 2_394_476, 2_195_362, 832_599, 1_816.0),
    (116, "Jaipur", "Rajasthan", Some(6_626_178), 3_468_507, 3_157_671, 1_207_412, 595.0),
    (438, "Ahmadabad", "Gujarat", Some(7_214_225), 3_788_051, 3_426_174, 1_514_718, 890.0),
    (446, "Surat", "Gujarat", Some(6_081_322), 3_402_224, 2_679_098, 1_436_522, 1_337.0),
    (536, "Hyderabad", "Telangana", Some(3_943_323), 2_018_575, 1_924_748, 779_805, 18_172.0),
    (230, "Patna", "Bihar", Some(5_838_465), 3_078_512, 2_759_953, 1_065_863, 1_823.0),
    (367, "Cuttack", "Odisha", Some(2_624_470), 1_339_153, 1_285_317, 600_011, 666.0),
    (369, "Khordha", "Odisha", Some(2_251_673), 1_166_949, 1_084_724, 503_306, 799.0),
    (527, "Nashik", "Maharashtra", Some(6_107_187), 3_157_186, 2_950_001, 1_218_523, 393.0),
    (517, "Thane", "Maharashtra", Some(11_060_148), 5_865_078, 5_195_070, 2_643_862, 1_157.0),
    (639, "Nicobars", "Andaman & Nicobar Islands", None, 0, 0, 0, 0.0),
];

const CSV_HEADER: &str = " censuscode,DISTRICT, ST_NM ,total_population,males,females,number_of_households,population_per_sq__km_, Type ,TOTAL";

/// Create test data files in temporary files.
///
/// Returns `(census_csv, feature_json)` describing the same districts. Both
/// files are removed when the handles are dropped.
pub fn create_test_data(config: &TestDataConfig) -> Result<(NamedTempFile, NamedTempFile)> {
    info!("Creating test data with config: {:?}", config);

    let census = create_census_csv(config)?;
    let features = create_feature_json(config)?;

    Ok((census, features))
}

fn create_census_csv(config: &TestDataConfig) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "{CSV_HEADER}")?;

    for &(code, district, state, population, males, females, households, density) in config.rows() {
        let population = population.map(|p| p.to_string()).unwrap_or_default();
        writeln!(
            file,
            "{code},{district},{state},{population},{males},{females},{households},{density}, District ,Total"
        )?;
        if config.include_non_total_rows {
            writeln!(
                file,
                "{code},{district},{state},{population},{males},{females},{households},{density},DISTRICT,Rural"
            )?;
            writeln!(
                file,
                "{code}01,{district} Tahsil,{state},{population},{males},{females},{households},{density},SUB-DISTRICT,Total"
            )?;
        }
    }

    file.flush()?;
    Ok(file)
}

fn create_feature_json(config: &TestDataConfig) -> Result<NamedTempFile> {
    let features: Vec<Value> = config
        .rows()
        .iter()
        .enumerate()
        .map(|(i, &(code, district, state, population, males, females, households, density))| {
            // One unit square per district on a 10-wide grid
            let x = 70.0 + (i % 10) as f64 * 2.0;
            let y = 10.0 + (i / 10) as f64 * 2.0;
            json!({
                "attributes": {
                    "censuscode": code,
                    "DISTRICT": district,
                    "ST_NM": state,
                    "total_population": population,
                    "males": males,
                    "females": females,
                    "number_of_households": households,
                    "population_per_sq__km_": density,
                    "type": "DISTRICT"
                },
                "geometry": {
                    "rings": [[[x, y], [x + 1.0, y], [x + 1.0, y + 1.0], [x, y + 1.0], [x, y]]]
                }
            })
        })
        .collect();

    let mut file = NamedTempFile::new()?;
    serde_json::to_writer(&mut file, &json!({ "features": features }))?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_limits_rows() {
        let config = TestDataConfig::minimal();
        assert_eq!(config.rows().len(), 4);
        assert_eq!(config.rows()[0].1, "Pune");
    }

    #[test]
    fn test_oversized_config_is_capped() {
        let config = TestDataConfig {
            districts: 10_000,
            include_non_total_rows: false,
        };
        assert_eq!(config.rows().len(), DISTRICTS.len());
    }

    #[test]
    fn test_csv_contains_noise_rows() {
        let (csv, _) = create_test_data(&TestDataConfig::minimal()).unwrap();
        let content = std::fs::read_to_string(csv.path()).unwrap();
        // header + 3 lines per district
        assert_eq!(content.lines().count(), 1 + 4 * 3);
        assert!(content.contains("SUB-DISTRICT"));
    }
}
