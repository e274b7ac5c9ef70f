//! The attribute predicate language understood by the feature service and
//! the map's layer filter.
//!
//! Every predicate the engine sends is built here. A [`FilterExpr`] keeps its
//! clauses structured so it can be rendered (`Display`) for a remote service
//! and evaluated ([`FilterExpr::matches`]) against features held in memory.

use std::{collections::BTreeSet, fmt};

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use zilla_data_processing::{CensusCode, Feature, fields};

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?\d+(\.\d+)?$").unwrap_or_else(|e| unreachable!("numeric pattern: {e}"))
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `ST_NM = '<state>'`
    StateEquals(String),
    /// `censuscode = '<code>'`
    CodeEquals(CensusCode),
    /// `censuscode IN (<codes>)`, never empty
    CodeIn(Vec<CensusCode>),
}

impl Clause {
    fn matches(&self, feature: &Feature) -> bool {
        match self {
            Self::StateEquals(state) => feature
                .attribute(fields::STATE)
                .and_then(|v| v.as_str())
                .is_some_and(|v| v.trim() == state),
            Self::CodeEquals(code) => feature.census_code().is_some_and(|c| c == *code),
            Self::CodeIn(codes) => feature
                .census_code()
                .is_some_and(|c| codes.contains(&c)),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateEquals(state) => write!(f, "{} = {}", fields::STATE, quote(state)),
            Self::CodeEquals(code) => {
                write!(f, "{} = {}", fields::CENSUS_CODE, quote(code.as_str()))
            }
            Self::CodeIn(codes) => write!(
                f,
                "{} IN ({})",
                fields::CENSUS_CODE,
                codes.iter().map(|c| literal(c.as_str())).join(",")
            ),
        }
    }
}

/// A conjunction of clauses, rendered joined by ` AND `.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterExpr {
    clauses: Vec<Clause>,
}

impl FilterExpr {
    pub fn state_equals(state: &str) -> Self {
        Self::from(Clause::StateEquals(state.to_owned()))
    }

    pub fn code_equals(code: &CensusCode) -> Self {
        Self::from(Clause::CodeEquals(code.clone()))
    }

    /// `None` when `codes` is empty; an empty `IN ()` list is not valid.
    pub fn code_in<'a>(codes: impl IntoIterator<Item = &'a CensusCode>) -> Option<Self> {
        let codes: Vec<CensusCode> = codes.into_iter().cloned().collect();
        (!codes.is_empty()).then(|| Self::from(Clause::CodeIn(codes)))
    }

    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        self.clauses.iter().all(|clause| clause.matches(feature))
    }
}

impl From<Clause> for FilterExpr {
    fn from(clause: Clause) -> Self {
        Self {
            clauses: vec![clause],
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clauses.iter().join(" AND "))
    }
}

/// The map filter for a selection scope: the selected state, the table
/// selection, both joined, or nothing.
pub fn scope_filter(state: Option<&str>, table: &BTreeSet<CensusCode>) -> Option<FilterExpr> {
    let state = state.map(FilterExpr::state_equals);
    let codes = FilterExpr::code_in(table);
    match (state, codes) {
        (Some(state), Some(codes)) => Some(state.and(codes)),
        (state, codes) => state.or(codes),
    }
}

/// Single-quoted string literal with embedded quotes doubled.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn literal(value: &str) -> String {
    if NUMERIC.is_match(value) {
        value.to_owned()
    } else {
        quote(value)
    }
}
