//! The single owner of selection state.
//!
//! Every mutation runs under one lock, never across an await, and hands back
//! the change together with a snapshot of the state it produced. Subscribers
//! receive the same changes through a broadcast channel.

use std::{collections::BTreeSet, fmt, sync::Arc};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;
use zilla_data_processing::{CensusCode, DistrictRecord};

pub use error::StoreError;

use crate::{collaborators::HighlightToken, config::DEFAULT_EVENT_CAPACITY, index::DistrictIndex};

mod error {
    use thiserror::Error;

    use super::SelectionKind;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        #[error("No {kind} named {key:?}")]
        NotFound { kind: SelectionKind, key: String },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    District,
    State,
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::District => f.write_str("district"),
            Self::State => f.write_str("state"),
        }
    }
}

/// Selection state at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    query: String,
    selected_district: Option<CensusCode>,
    selected_state: Option<String>,
    table_selection: BTreeSet<CensusCode>,
    visible_districts: Option<BTreeSet<CensusCode>>,
    highlight: Option<HighlightToken>,
    viewport_generation: u64,
}

impl SelectionState {
    /// Raw text of the search box.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub const fn selected_district(&self) -> Option<&CensusCode> {
        self.selected_district.as_ref()
    }

    pub fn selected_state(&self) -> Option<&str> {
        self.selected_state.as_deref()
    }

    pub const fn table_selection(&self) -> &BTreeSet<CensusCode> {
        &self.table_selection
    }

    /// `None` until a viewport result has been applied.
    pub const fn visible_districts(&self) -> Option<&BTreeSet<CensusCode>> {
        self.visible_districts.as_ref()
    }

    pub const fn highlight(&self) -> Option<HighlightToken> {
        self.highlight
    }

    pub const fn viewport_generation(&self) -> u64 {
        self.viewport_generation
    }

    fn in_scope(&self, index: &DistrictIndex, code: &CensusCode) -> bool {
        match (&self.selected_state, &self.visible_districts) {
            (Some(state), _) => index.in_state(code.as_str(), state),
            (None, Some(visible)) => visible.contains(code),
            (None, None) => index.contains(code.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    QueryChanged,
    DistrictSelected(CensusCode),
    StateSelected(String),
    TableSelectionChanged,
    VisibleChanged {
        generation: u64,
        cleared_table_selection: bool,
    },
    Reset,
}

/// A committed change and the state right after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreUpdate {
    pub change: SelectionChange,
    pub snapshot: SelectionState,
    /// Highlight the change took out of the state; the caller disposes it
    pub released_highlight: Option<HighlightToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibleOutcome {
    Applied(StoreUpdate),
    /// Same set as before; nothing changed
    Unchanged { generation: u64 },
    /// A newer viewport event superseded this result
    Stale { generation: u64, current: u64 },
}

impl VisibleOutcome {
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug)]
pub struct SelectionStore {
    index: Arc<DistrictIndex>,
    state: Mutex<SelectionState>,
    events: broadcast::Sender<SelectionChange>,
}

impl SelectionStore {
    pub fn new(index: Arc<DistrictIndex>) -> Self {
        Self::with_capacity(index, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(index: Arc<DistrictIndex>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            index,
            state: Mutex::new(SelectionState::default()),
            events,
        }
    }

    pub const fn index(&self) -> &Arc<DistrictIndex> {
        &self.index
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectionChange> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SelectionState {
        self.state.lock().clone()
    }

    pub fn query(&self) -> String {
        self.state.lock().query.clone()
    }

    pub fn selected_district(&self) -> Option<CensusCode> {
        self.state.lock().selected_district.clone()
    }

    pub fn selected_state(&self) -> Option<String> {
        self.state.lock().selected_state.clone()
    }

    pub fn table_selection(&self) -> BTreeSet<CensusCode> {
        self.state.lock().table_selection.clone()
    }

    pub fn visible_districts(&self) -> Option<BTreeSet<CensusCode>> {
        self.state.lock().visible_districts.clone()
    }

    pub fn viewport_generation(&self) -> u64 {
        self.state.lock().viewport_generation
    }

    pub fn highlight(&self) -> Option<HighlightToken> {
        self.state.lock().highlight
    }

    /// Snapshot the state and broadcast `change` before the guard is
    /// released, so subscribers see changes in commit order.
    fn commit(
        &self,
        state: MutexGuard<'_, SelectionState>,
        change: SelectionChange,
        released_highlight: Option<HighlightToken>,
    ) -> StoreUpdate {
        debug!(?change, "Selection changed");
        let snapshot = state.clone();
        // No subscribers is fine
        let _ = self.events.send(change.clone());
        drop(state);
        StoreUpdate {
            change,
            snapshot,
            released_highlight,
        }
    }

    pub fn set_query(&self, raw: impl Into<String>) -> StoreUpdate {
        let mut state = self.state.lock();
        state.query = raw.into();
        self.commit(state, SelectionChange::QueryChanged, None)
    }

    /// Select one district, clearing any selected state and the table
    /// selection. Unknown codes leave the state untouched.
    pub fn select_district(&self, code: &str) -> Result<StoreUpdate, StoreError> {
        let Some(record) = self.index.get(code.trim()) else {
            debug!(code, "Unknown district");
            return Err(StoreError::NotFound {
                kind: SelectionKind::District,
                key: code.to_owned(),
            });
        };
        let code = record.census_code.clone();

        let mut state = self.state.lock();
        state.selected_district = Some(code.clone());
        state.selected_state = None;
        state.table_selection.clear();
        Ok(self.commit(state, SelectionChange::DistrictSelected(code), None))
    }

    /// Select a whole state by name, matched case-insensitively and stored
    /// as spelled in the data. Releases the district highlight.
    pub fn select_state(&self, name: &str) -> Result<StoreUpdate, StoreError> {
        let Some(canonical) = self.index.canonical_state(name) else {
            debug!(name, "Unknown state");
            return Err(StoreError::NotFound {
                kind: SelectionKind::State,
                key: name.to_owned(),
            });
        };
        let canonical = canonical.to_owned();

        let mut state = self.state.lock();
        state.selected_state = Some(canonical.clone());
        state.selected_district = None;
        state.table_selection.clear();
        let released = state.highlight.take();
        Ok(self.commit(state, SelectionChange::StateSelected(canonical), released))
    }

    /// Replace the table selection. Codes outside the current scope are
    /// dropped.
    pub fn set_table_selection(&self, codes: impl IntoIterator<Item = CensusCode>) -> StoreUpdate {
        let mut state = self.state.lock();
        let mut dropped = 0usize;
        let selection: BTreeSet<CensusCode> = codes
            .into_iter()
            .filter(|code| {
                let keep = state.in_scope(&self.index, code);
                dropped += usize::from(!keep);
                keep
            })
            .collect();
        if dropped > 0 {
            debug!(dropped, "Dropped out-of-scope table rows");
        }
        state.table_selection = selection;
        self.commit(state, SelectionChange::TableSelectionChanged, None)
    }

    /// Start a viewport event; results carrying an older generation are
    /// ignored from now on.
    pub fn next_viewport_generation(&self) -> u64 {
        let mut state = self.state.lock();
        state.viewport_generation += 1;
        state.viewport_generation
    }

    /// Apply the districts a viewport query found, if `generation` is still
    /// the current one. Codes unknown to the index are ignored. A changed set
    /// clears the table selection.
    pub fn set_visible(
        &self,
        generation: u64,
        codes: impl IntoIterator<Item = CensusCode>,
    ) -> VisibleOutcome {
        let mut state = self.state.lock();
        if generation != state.viewport_generation {
            debug!(
                generation,
                current = state.viewport_generation,
                "Dropping stale viewport result"
            );
            return VisibleOutcome::Stale {
                generation,
                current: state.viewport_generation,
            };
        }
        let visible: BTreeSet<CensusCode> = codes
            .into_iter()
            .filter(|code| self.index.contains(code.as_str()))
            .collect();
        if state.visible_districts.as_ref() == Some(&visible) {
            return VisibleOutcome::Unchanged { generation };
        }
        state.visible_districts = Some(visible);
        let cleared = !state.table_selection.is_empty();
        state.table_selection.clear();

        VisibleOutcome::Applied(self.commit(
            state,
            SelectionChange::VisibleChanged {
                generation,
                cleared_table_selection: cleared,
            },
            None,
        ))
    }

    /// Clear district, state and table selection and release the highlight.
    /// The query text is kept.
    pub fn reset(&self) -> StoreUpdate {
        self.reset_inner(false)
    }

    pub fn reset_including_query(&self) -> StoreUpdate {
        self.reset_inner(true)
    }

    fn reset_inner(&self, clear_query: bool) -> StoreUpdate {
        let mut state = self.state.lock();
        state.selected_district = None;
        state.selected_state = None;
        state.table_selection.clear();
        if clear_query {
            state.query.clear();
        }
        let released = state.highlight.take();
        self.commit(state, SelectionChange::Reset, released)
    }

    /// Store a new highlight, returning the one it replaces.
    pub fn replace_highlight(&self, token: HighlightToken) -> Option<HighlightToken> {
        self.state.lock().highlight.replace(token)
    }

    pub fn take_highlight(&self) -> Option<HighlightToken> {
        self.state.lock().highlight.take()
    }

    /// Codes the table may select from: the selected state's districts, else
    /// the visible districts, else every district.
    pub fn table_scope(&self) -> Vec<CensusCode> {
        self.scope_records()
            .into_iter()
            .map(|record| record.census_code.clone())
            .collect()
    }

    /// Records of [`Self::table_scope`], in index order.
    pub fn scope_records(&self) -> Vec<&DistrictRecord> {
        let state = self.snapshot();
        match (&state.selected_state, &state.visible_districts) {
            (Some(name), _) => self.index.districts_in_state(name).collect(),
            (None, Some(visible)) => self
                .index
                .records()
                .iter()
                .filter(|record| visible.contains(&record.census_code))
                .collect(),
            (None, None) => self.index.records().iter().collect(),
        }
    }
}
