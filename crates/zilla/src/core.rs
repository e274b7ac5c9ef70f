//! The [`DistrictFinder`] ties the district index, the selection store, the
//! viewport reconciler and the map effects together.
//!
//! Every entry point mutates the store first and then applies the effects of
//! that one change, so the search box, the table, the map filter and the
//! highlight are always brought in line with the same snapshot.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, instrument};
use zilla_data_processing::{CensusCode, DataSource, DistrictRecord, Extent, load_districts};

use crate::{
    collaborators::{FeatureSource, MapSurface},
    config::FinderConfig,
    effects::{EffectReport, SelectionEffects},
    error::ZillaError,
    filter::{self, FilterExpr},
    index::DistrictIndex,
    search::{Candidate, search},
    store::{SelectionChange, SelectionState, SelectionStore, StoreUpdate, VisibleOutcome},
    viewport::ViewportReconciler,
};

pub struct DistrictFinder {
    index: Arc<DistrictIndex>,
    store: Arc<SelectionStore>,
    viewport: ViewportReconciler,
    effects: SelectionEffects,
    config: FinderConfig,
}

impl DistrictFinder {
    /// Finder with the default configuration.
    pub fn new(
        index: DistrictIndex,
        source: Arc<dyn FeatureSource>,
        map: Arc<dyn MapSurface>,
    ) -> Self {
        Self::with_config(index, source, map, FinderConfig::default())
    }

    pub fn with_config(
        index: DistrictIndex,
        source: Arc<dyn FeatureSource>,
        map: Arc<dyn MapSurface>,
        config: FinderConfig,
    ) -> Self {
        let index = Arc::new(index);
        let store = Arc::new(SelectionStore::with_capacity(
            index.clone(),
            config.event_capacity,
        ));
        let viewport = ViewportReconciler::new(store.clone(), source.clone());
        let effects = SelectionEffects::new(store.clone(), source, map, config.effects);
        Self {
            index,
            store,
            viewport,
            effects,
            config,
        }
    }

    /// Load the districts from `data_source` and build a finder over them.
    #[instrument(name = "Initialize DistrictFinder", level = "info", skip(source, map, config))]
    pub fn initialize(
        data_source: &DataSource,
        source: Arc<dyn FeatureSource>,
        map: Arc<dyn MapSurface>,
        config: FinderConfig,
    ) -> Result<Self, ZillaError> {
        let t_init = std::time::Instant::now();
        config.validate()?;

        let dataset = load_districts(data_source)?;
        let index = DistrictIndex::from_dataset(dataset)?;

        info!(
            districts = index.len(),
            states = index.states().len(),
            elapsed_seconds = ?t_init.elapsed(),
            "DistrictFinder initialization complete"
        );
        Ok(Self::with_config(index, source, map, config))
    }

    pub const fn index(&self) -> &Arc<DistrictIndex> {
        &self.index
    }

    pub const fn store(&self) -> &Arc<SelectionStore> {
        &self.store
    }

    pub const fn config(&self) -> &FinderConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SelectionState {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SelectionChange> {
        self.store.subscribe()
    }

    /// Suggestions for the current query, scoped to the selected state.
    pub fn suggestions(&self) -> Vec<Candidate> {
        let state = self.store.snapshot();
        search(
            &self.index,
            state.query(),
            state.selected_state(),
            &self.config.search,
        )
    }

    /// Store `raw` as the query and return the suggestions for it.
    pub fn suggest(&self, raw: &str) -> Vec<Candidate> {
        self.store.set_query(raw);
        self.suggestions()
    }

    /// Store the query text. Clearing it keeps the selected state.
    pub async fn set_query(&self, raw: &str) -> EffectReport {
        let update = self.store.set_query(raw);
        self.effects.apply(&update).await
    }

    /// Act on a chosen suggestion. A district becomes the selected district
    /// and fills the search box; a state becomes the selected state and
    /// empties it, so the suggestions list that state's most populous
    /// districts.
    pub async fn pick(&self, candidate: &Candidate) -> Result<EffectReport, ZillaError> {
        match candidate {
            Candidate::District { record, .. } => {
                let report = self.select_district(record.census_code.as_str()).await?;
                self.store.set_query(record.district_name.as_str());
                Ok(report)
            }
            Candidate::State { name, .. } => {
                let report = self.select_state(name).await?;
                self.store.set_query(String::new());
                Ok(report)
            }
        }
    }

    pub async fn select_district(&self, code: &str) -> Result<EffectReport, ZillaError> {
        let update = self.store.select_district(code)?;
        Ok(self.effects.apply(&update).await)
    }

    pub async fn select_state(&self, name: &str) -> Result<EffectReport, ZillaError> {
        let update = self.store.select_state(name)?;
        Ok(self.effects.apply(&update).await)
    }

    /// Replace the table selection; rows outside the current scope are
    /// dropped.
    pub async fn select_rows(&self, codes: impl IntoIterator<Item = CensusCode>) -> EffectReport {
        let update = self.store.set_table_selection(codes);
        self.effects.apply(&update).await
    }

    /// The map stopped moving over `extent`.
    pub async fn viewport_idle(&self, extent: Extent) -> Result<VisibleOutcome, ZillaError> {
        let outcome = self.viewport.on_viewport_idle(extent).await?;
        if let VisibleOutcome::Applied(update) = &outcome {
            self.effects.apply(update).await;
        }
        Ok(outcome)
    }

    pub async fn reset(&self) -> EffectReport {
        self.apply(self.store.reset()).await
    }

    pub async fn reset_including_query(&self) -> EffectReport {
        self.apply(self.store.reset_including_query()).await
    }

    async fn apply(&self, update: StoreUpdate) -> EffectReport {
        self.effects.apply(&update).await
    }

    /// Rows for the district table: the selected state's districts, else the
    /// visible ones, else all, in index order.
    pub fn table_rows(&self) -> Vec<&DistrictRecord> {
        self.store.scope_records()
    }

    /// The filter the map should currently show.
    pub fn filter(&self) -> Option<FilterExpr> {
        let state = self.store.snapshot();
        filter::scope_filter(state.selected_state(), state.table_selection())
    }
}
