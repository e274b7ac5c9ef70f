//! Ranked, population-aware suggestions for a free-text query.
//!
//! An empty query lists the most populous districts. A non-empty query
//! matches district names by prefix, then by substring. Without a state
//! scope, states whose districts did not match by name can surface as
//! synthetic state candidates, an exact state name outranking everything.

use std::cmp::Reverse;

use ahash::AHashMap;
use tracing::{instrument, trace};
use zilla_data_processing::{CensusCode, DistrictRecord};

use crate::index::DistrictIndex;

pub const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Maximum number of candidates returned
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Match quality, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchScore {
    ExactState = 0,
    DistrictPrefix = 1,
    DistrictSubstring = 2,
    StatePrefix = 3,
    StateSubstring = 4,
}

impl MatchScore {
    pub const fn rank(self) -> u8 {
        self as u8
    }

    fn for_district(name: &str, query: &str) -> Option<Self> {
        if name.starts_with(query) {
            Some(Self::DistrictPrefix)
        } else if name.contains(query) {
            Some(Self::DistrictSubstring)
        } else {
            None
        }
    }

    fn for_state(name: &str, query: &str) -> Option<Self> {
        if name == query {
            Some(Self::ExactState)
        } else if name.starts_with(query) {
            Some(Self::StatePrefix)
        } else if name.contains(query) {
            Some(Self::StateSubstring)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    District,
    State,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// `score` is `None` for popular-mode results
    District {
        record: DistrictRecord,
        score: Option<MatchScore>,
    },
    /// A whole state; it has no census code and population 0
    State { name: String, score: MatchScore },
}

impl Candidate {
    pub const fn kind(&self) -> CandidateKind {
        match self {
            Self::District { .. } => CandidateKind::District,
            Self::State { .. } => CandidateKind::State,
        }
    }

    /// Text shown for the candidate: the district or state name.
    pub fn label(&self) -> &str {
        match self {
            Self::District { record, .. } => &record.district_name,
            Self::State { name, .. } => name,
        }
    }

    pub fn state_name(&self) -> &str {
        match self {
            Self::District { record, .. } => &record.state_name,
            Self::State { name, .. } => name,
        }
    }

    pub const fn census_code(&self) -> Option<&CensusCode> {
        match self {
            Self::District { record, .. } => Some(&record.census_code),
            Self::State { .. } => None,
        }
    }

    pub fn population(&self) -> u64 {
        match self {
            Self::District { record, .. } => record.population_or_zero(),
            Self::State { .. } => 0,
        }
    }

    pub const fn score(&self) -> Option<MatchScore> {
        match self {
            Self::District { score, .. } => *score,
            Self::State { score, .. } => Some(*score),
        }
    }
}

pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Suggestions for `raw_query`, at most `config.limit` of them.
///
/// `scope_state` (matched case-insensitively) restricts results to that
/// state's districts and disables state candidates. Ordering is fully
/// determined by the index order, so equal inputs give equal outputs.
#[instrument(name = "Search", level = "trace", skip(index, config), fields(limit = config.limit))]
pub fn search(
    index: &DistrictIndex,
    raw_query: &str,
    scope_state: Option<&str>,
    config: &SearchConfig,
) -> Vec<Candidate> {
    let query = normalize_query(raw_query);
    let scope = scope_state.map(normalize_query);
    let in_scope = |record: &&DistrictRecord| {
        scope
            .as_deref()
            .is_none_or(|state| record.state_name.to_lowercase() == state)
    };

    if query.is_empty() {
        let mut popular: Vec<&DistrictRecord> = index.records().iter().filter(in_scope).collect();
        popular.sort_by_key(|record| Reverse(record.population_or_zero()));
        return popular
            .into_iter()
            .take(config.limit)
            .map(|record| Candidate::District {
                record: record.clone(),
                score: None,
            })
            .collect();
    }

    let mut scored: Vec<(MatchScore, Candidate)> = Vec::new();

    if scope.is_some() {
        for record in index.records().iter().filter(in_scope) {
            if let Some(score) =
                MatchScore::for_district(&record.district_name.to_lowercase(), &query)
            {
                scored.push((score, district(record, score)));
            }
        }
    } else {
        // Best score per state, in first-seen order
        let mut states: Vec<(&str, Option<MatchScore>)> = Vec::new();
        let mut slots: AHashMap<String, usize> = AHashMap::new();

        for record in index.records() {
            if let Some(score) =
                MatchScore::for_district(&record.district_name.to_lowercase(), &query)
            {
                scored.push((score, district(record, score)));
                continue;
            }
            let state = record.state_name.to_lowercase();
            let Some(score) = MatchScore::for_state(&state, &query) else {
                continue;
            };
            let slot = *slots.entry(state).or_insert_with(|| {
                states.push((record.state_name.as_str(), None));
                states.len() - 1
            });
            let best = &mut states[slot].1;
            *best = Some(best.map_or(score, |b| b.min(score)));
        }

        scored.extend(states.into_iter().filter_map(|(name, score)| {
            score.map(|score| {
                (
                    score,
                    Candidate::State {
                        name: name.to_owned(),
                        score,
                    },
                )
            })
        }));
    }

    scored.sort_by_key(|(score, _)| *score);
    scored.truncate(config.limit);
    trace!(query = %query, matches = scored.len(), "Ranked candidates");
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}

fn district(record: &DistrictRecord, score: MatchScore) -> Candidate {
    Candidate::District {
        record: record.clone(),
        score: Some(score),
    }
}
