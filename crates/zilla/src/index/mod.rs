use ahash::AHashMap;
use tracing::{debug, instrument};
use zilla_data_processing::{CensusCode, DistrictDataset, DistrictRecord};

pub use error::IndexError;

mod error {
    use thiserror::Error;
    use zilla_data_processing::CensusCode;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum IndexError {
        #[error("Census code {0} appears more than once")]
        DuplicateCode(CensusCode),
    }
}

/// The session's districts, keyed by census code and grouped by state.
///
/// Record order is load order; it is the tie-break for every ranking and the
/// row order of the district table.
#[derive(Debug, Clone, Default)]
pub struct DistrictIndex {
    records: Vec<DistrictRecord>,
    by_code: AHashMap<CensusCode, usize>,
    /// Lowercased state name -> record positions
    by_state: AHashMap<String, Vec<usize>>,
    /// State names as first seen
    states: Vec<String>,
}

impl DistrictIndex {
    #[instrument(name = "Build district index", level = "debug", skip_all, fields(records = records.len()))]
    pub fn new(records: Vec<DistrictRecord>) -> Result<Self, IndexError> {
        let mut by_code = AHashMap::with_capacity(records.len());
        let mut by_state: AHashMap<String, Vec<usize>> = AHashMap::new();
        let mut states = Vec::new();

        for (i, record) in records.iter().enumerate() {
            if by_code.insert(record.census_code.clone(), i).is_some() {
                return Err(IndexError::DuplicateCode(record.census_code.clone()));
            }
            let key = record.state_name.to_lowercase();
            by_state
                .entry(key)
                .or_insert_with(|| {
                    states.push(record.state_name.clone());
                    Vec::new()
                })
                .push(i);
        }

        debug!(districts = records.len(), states = states.len(), "Indexed districts");
        Ok(Self {
            records,
            by_code,
            by_state,
            states,
        })
    }

    pub fn from_dataset(dataset: DistrictDataset) -> Result<Self, IndexError> {
        Self::new(dataset.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[DistrictRecord] {
        &self.records
    }

    pub fn get(&self, code: &str) -> Option<&DistrictRecord> {
        self.by_code.get(code).map(|&i| &self.records[i])
    }

    pub fn contains(&self, code: &str) -> bool {
        self.by_code.contains_key(code)
    }

    /// Distinct state names in first-seen order.
    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// The state's name as spelled in the data, matched case-insensitively.
    pub fn canonical_state(&self, name: &str) -> Option<&str> {
        self.by_state
            .get(name.trim().to_lowercase().as_str())
            .and_then(|positions| positions.first())
            .map(|&i| self.records[i].state_name.as_str())
    }

    /// Districts of a state in index order; empty for unknown states.
    pub fn districts_in_state<'a>(
        &'a self,
        name: &str,
    ) -> impl Iterator<Item = &'a DistrictRecord> + 'a {
        self.by_state
            .get(name.trim().to_lowercase().as_str())
            .into_iter()
            .flatten()
            .map(|&i| &self.records[i])
    }

    pub fn state_of(&self, code: &str) -> Option<&str> {
        self.get(code).map(|r| r.state_name.as_str())
    }

    /// Whether the district belongs to the state, with the state matched the
    /// same way as [`Self::districts_in_state`].
    pub fn in_state(&self, code: &str, state: &str) -> bool {
        match (
            self.by_code.get(code),
            self.by_state.get(state.trim().to_lowercase().as_str()),
        ) {
            (Some(i), Some(positions)) => positions.contains(i),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> DistrictIndex {
        DistrictIndex::new(vec![
            DistrictRecord::new("601", "Thiruvananthapuram", "Kerala", Some(3_301_427)),
            DistrictRecord::new("392", "Puri", "Odisha", Some(1_698_730)),
            DistrictRecord::new("595", "Ernakulam", "Kerala", None),
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup_by_code() {
        let index = index();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get("392").unwrap().district_name, "Puri");
        assert!(index.contains("595"));
        assert!(index.get("999").is_none());
        assert_eq!(index.state_of("601"), Some("Kerala"));
    }

    #[test]
    fn test_states_are_grouped_case_insensitively() {
        let index = index();
        assert_eq!(index.states(), ["Kerala", "Odisha"]);
        assert_eq!(index.canonical_state(" KERALA "), Some("Kerala"));
        assert_eq!(index.canonical_state("Goa"), None);

        let kerala: Vec<_> = index
            .districts_in_state("kerala")
            .map(|r| r.district_name.as_str())
            .collect();
        assert_eq!(kerala, ["Thiruvananthapuram", "Ernakulam"]);
        assert_eq!(index.districts_in_state("Goa").count(), 0);
    }

    #[test]
    fn test_state_membership_ignores_spelling() {
        let index = DistrictIndex::new(vec![
            DistrictRecord::new("101", "Thiruvananthapuram", "Kerala", None),
            DistrictRecord::new("103", "Kollam", "KERALA", None),
            DistrictRecord::new("392", "Puri", "Odisha", None),
        ])
        .unwrap();

        assert!(index.in_state("103", "Kerala"));
        assert!(index.in_state("101", "kerala "));
        assert!(!index.in_state("392", "Kerala"));
        assert!(!index.in_state("999", "Kerala"));
        assert!(!index.in_state("101", "Goa"));
    }

    #[test]
    fn test_duplicate_codes_are_rejected() {
        let err = DistrictIndex::new(vec![
            DistrictRecord::new("1", "A", "S", None),
            DistrictRecord::new("1", "B", "S", None),
        ])
        .unwrap_err();
        assert_eq!(err, IndexError::DuplicateCode(CensusCode::from("1")));
    }

    #[test]
    fn test_empty_index() {
        let index = DistrictIndex::new(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.states().is_empty());
    }
}
