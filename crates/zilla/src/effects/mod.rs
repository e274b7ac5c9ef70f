//! Side effects of selection changes on the map: fly-to, highlight, popup,
//! layer filter and the return home on reset.
//!
//! Effects never fail the change that triggered them. Collaborator errors are
//! logged and collected in an [`EffectReport`].

use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};
use zilla_data_processing::{CensusCode, Feature, FeatureSet};

use crate::{
    collaborators::{
        FeatureQuery, FeatureSource, FlyTarget, HighlightToken, MapSurface, SyncError, checked,
    },
    config::EffectsConfig,
    filter::{self, FilterExpr},
    store::{SelectionChange, SelectionStore, StoreUpdate},
};

/// What applying one change did not manage to do.
#[derive(Debug, Default)]
pub struct EffectReport {
    pub failures: Vec<SyncError>,
    /// The selection moved on while the effect was waiting on the feature
    /// source; the map was left alone
    pub superseded: bool,
}

impl EffectReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.superseded
    }

    fn record(&mut self, effect: &'static str, result: anyhow::Result<()>) {
        if let Err(source) = result {
            warn!(effect, error = %source, "Map command failed");
            self.failures.push(SyncError::Effect { effect, source });
        }
    }
}

pub struct SelectionEffects {
    store: Arc<SelectionStore>,
    source: Arc<dyn FeatureSource>,
    map: Arc<dyn MapSurface>,
    config: EffectsConfig,
    /// Last filter pushed to the map; outer `None` until the first push
    last_filter: Mutex<Option<Option<FilterExpr>>>,
}

impl SelectionEffects {
    pub fn new(
        store: Arc<SelectionStore>,
        source: Arc<dyn FeatureSource>,
        map: Arc<dyn MapSurface>,
        config: EffectsConfig,
    ) -> Self {
        Self {
            store,
            source,
            map,
            config,
            last_filter: Mutex::new(None),
        }
    }

    pub const fn config(&self) -> &EffectsConfig {
        &self.config
    }

    /// Bring the map in line with `update`.
    #[instrument(name = "Apply effects", level = "debug", skip_all, fields(change = ?update.change))]
    pub async fn apply(&self, update: &StoreUpdate) -> EffectReport {
        let mut report = EffectReport::default();

        if let Some(token) = update.released_highlight {
            self.dispose(token, &mut report);
        }
        self.sync_filter(&mut report);

        match &update.change {
            SelectionChange::DistrictSelected(code) => self.focus_district(code, &mut report).await,
            SelectionChange::StateSelected(name) => self.focus_state(name, &mut report).await,
            SelectionChange::Reset => {
                report.record("go_home", self.map.go_home(&self.config.home).await);
            }
            SelectionChange::QueryChanged
            | SelectionChange::TableSelectionChanged
            | SelectionChange::VisibleChanged { .. } => {}
        }

        report
    }

    /// Push the filter for the store's current scope, unless the map already
    /// has it.
    pub fn sync_filter(&self, report: &mut EffectReport) {
        let state = self.store.snapshot();
        let next = filter::scope_filter(state.selected_state(), state.table_selection());

        let mut last = self.last_filter.lock();
        if last.as_ref() == Some(&next) {
            return;
        }
        match self.map.set_filter(next.as_ref()) {
            Ok(()) => {
                debug!(filter = ?next.as_ref().map(ToString::to_string), "Map filter updated");
                *last = Some(next);
            }
            Err(source) => {
                warn!(error = %source, "Failed to set map filter");
                // Unknown map state: push again next time
                *last = None;
                report.failures.push(SyncError::Effect {
                    effect: "set_filter",
                    source,
                });
            }
        }
    }

    async fn fetch(&self, query: FeatureQuery, report: &mut EffectReport) -> Option<FeatureSet> {
        checked(self.source.query(query).await)
            .inspect_err(|e| warn!(error = %e, "Feature query failed"))
            .map_err(|e| report.failures.push(SyncError::TransientQuery(e)))
            .ok()
    }

    async fn focus_district(&self, code: &CensusCode, report: &mut EffectReport) {
        let query = FeatureQuery::matching(FilterExpr::code_equals(code)).with_geometry(true);
        let Some(set) = self.fetch(query, report).await else {
            return;
        };
        if !self.still_selected(code, report) {
            return;
        }
        let Some(feature) = set.features.into_iter().next() else {
            warn!(%code, "Selected district has no feature");
            report.failures.push(SyncError::TransientQuery(anyhow!(
                "no feature for district {code}"
            )));
            return;
        };

        let anchor = feature.centroid();
        match anchor {
            Some(point) => report.record(
                "go_to",
                self.map
                    .go_to(FlyTarget::Point(point), self.config.district_zoom)
                    .await,
            ),
            None => warn!(%code, "Selected district has no geometry"),
        }
        if !self.still_selected(code, report) {
            return;
        }

        self.replace_highlight(&feature, report);
        if let Some(point) = anchor {
            report.record("show_popup", self.map.show_popup(&feature, point));
        }
    }

    async fn focus_state(&self, name: &str, report: &mut EffectReport) {
        let query = FeatureQuery::matching(FilterExpr::state_equals(name)).with_geometry(true);
        let Some(set) = self.fetch(query, report).await else {
            return;
        };
        if self.store.selected_state().as_deref() != Some(name) {
            debug!(state = name, "State selection superseded");
            report.superseded = true;
            return;
        }
        // A district effect may have finished in between
        if let Some(stale) = self.store.take_highlight() {
            self.dispose(stale, report);
        }

        let median = set.features.len() / 2;
        let target = set.features.get(median).and_then(|feature| {
            let geometry = feature.geometry.as_ref()?;
            geometry
                .extent()
                .map(FlyTarget::Extent)
                .or_else(|| geometry.centroid().map(FlyTarget::Point))
        });
        match target {
            Some(target) => report.record(
                "go_to",
                self.map.go_to(target, self.config.state_zoom).await,
            ),
            None => warn!(
                state = name,
                features = set.features.len(),
                "Nothing to fly to for state"
            ),
        }
    }

    fn still_selected(&self, code: &CensusCode, report: &mut EffectReport) -> bool {
        let current = self.store.selected_district();
        if current.as_ref() == Some(code) {
            return true;
        }
        debug!(%code, ?current, "District selection superseded");
        report.superseded = true;
        false
    }

    /// Dispose the previous highlight, then highlight `feature`.
    fn replace_highlight(&self, feature: &Feature, report: &mut EffectReport) {
        if let Some(previous) = self.store.take_highlight() {
            self.dispose(previous, report);
        }
        match self.map.highlight(feature) {
            Ok(token) => {
                if let Some(stray) = self.store.replace_highlight(token) {
                    self.dispose(stray, report);
                }
            }
            Err(source) => report.record("highlight", Err(source)),
        }
    }

    fn dispose(&self, token: HighlightToken, report: &mut EffectReport) {
        report.record("remove_highlight", self.map.remove_highlight(token));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use zilla_data_processing::{DistrictRecord, Geometry, Point};

    use super::*;
    use crate::{collaborators::MemoryFeatureSource, config::HomeView, index::DistrictIndex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        GoTo(FlyTarget, f64),
        GoHome,
        Highlight(u64),
        Remove(u64),
        Popup,
        Filter(Option<String>),
    }

    #[derive(Default)]
    struct RecordingMap {
        calls: Mutex<Vec<Call>>,
        next: AtomicU64,
        fail_removal: bool,
    }

    impl RecordingMap {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl MapSurface for RecordingMap {
        async fn go_to(&self, target: FlyTarget, zoom: f64) -> anyhow::Result<()> {
            self.calls.lock().push(Call::GoTo(target, zoom));
            Ok(())
        }

        async fn go_home(&self, _home: &HomeView) -> anyhow::Result<()> {
            self.calls.lock().push(Call::GoHome);
            Ok(())
        }

        fn highlight(&self, _feature: &Feature) -> anyhow::Result<HighlightToken> {
            let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            self.calls.lock().push(Call::Highlight(id));
            Ok(HighlightToken::new(id))
        }

        fn remove_highlight(&self, token: HighlightToken) -> anyhow::Result<()> {
            self.calls.lock().push(Call::Remove(token.id()));
            if self.fail_removal {
                anyhow::bail!("layer already gone");
            }
            Ok(())
        }

        fn show_popup(&self, _feature: &Feature, _anchor: Point) -> anyhow::Result<()> {
            self.calls.lock().push(Call::Popup);
            Ok(())
        }

        fn set_filter(&self, filter: Option<&FilterExpr>) -> anyhow::Result<()> {
            self.calls
                .lock()
                .push(Call::Filter(filter.map(ToString::to_string)));
            Ok(())
        }
    }

    fn square(code: u64, state: &str, x: f64) -> Feature {
        let attributes = match json!({ "censuscode": code, "ST_NM": state }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let ring = vec![
            vec![x, 0.0],
            vec![x + 2.0, 0.0],
            vec![x + 2.0, 2.0],
            vec![x, 2.0],
            vec![x, 0.0],
        ];
        Feature::new(attributes, Some(Geometry::Polygon { rings: vec![ring] }))
    }

    fn setup(map: RecordingMap) -> (Arc<SelectionStore>, Arc<RecordingMap>, SelectionEffects) {
        let index = DistrictIndex::new(vec![
            DistrictRecord::new("101", "Thiruvananthapuram", "Kerala", None),
            DistrictRecord::new("102", "Ernakulam", "Kerala", None),
            DistrictRecord::new("103", "Kozhikode", "Kerala", None),
            DistrictRecord::new("392", "Puri", "Odisha", None),
        ])
        .unwrap();
        let source = MemoryFeatureSource::new(vec![
            square(101, "Kerala", 0.0),
            square(102, "Kerala", 10.0),
            square(103, "Kerala", 20.0),
            square(392, "Odisha", 30.0),
        ]);
        let store = Arc::new(SelectionStore::new(Arc::new(index)));
        let map = Arc::new(map);
        let effects = SelectionEffects::new(
            store.clone(),
            Arc::new(source),
            map.clone(),
            EffectsConfig::default(),
        );
        (store, map, effects)
    }

    #[tokio::test]
    async fn test_district_selection_flies_highlights_and_pops_up() {
        let (store, map, effects) = setup(RecordingMap::default());

        let update = store.select_district("102").unwrap();
        let report = effects.apply(&update).await;

        assert!(report.is_clean(), "{report:?}");
        assert_eq!(
            map.calls(),
            vec![
                Call::Filter(None),
                Call::GoTo(FlyTarget::Point(Point::new(11.0, 1.0)), 9.0),
                Call::Highlight(1),
                Call::Popup,
            ]
        );
        assert_eq!(store.highlight(), Some(HighlightToken::new(1)));
    }

    #[tokio::test]
    async fn test_single_highlight_even_when_disposal_fails() {
        let (store, map, effects) = setup(RecordingMap {
            fail_removal: true,
            ..RecordingMap::default()
        });

        effects.apply(&store.select_district("101").unwrap()).await;
        let report = effects.apply(&store.select_district("392").unwrap()).await;

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            SyncError::Effect {
                effect: "remove_highlight",
                ..
            }
        ));
        assert_eq!(store.highlight(), Some(HighlightToken::new(2)));
        let calls = map.calls();
        let removed = calls.iter().position(|c| *c == Call::Remove(1)).unwrap();
        let added = calls.iter().position(|c| *c == Call::Highlight(2)).unwrap();
        assert!(removed < added);
    }

    #[tokio::test]
    async fn test_state_selection_filters_and_flies_to_median_feature() {
        let (store, map, effects) = setup(RecordingMap::default());
        effects.apply(&store.select_district("392").unwrap()).await;

        let update = store.select_state("KERALA").unwrap();
        let report = effects.apply(&update).await;
        assert!(report.is_clean(), "{report:?}");

        let calls = map.calls();
        assert_eq!(
            calls[calls.len() - 3..],
            [
                Call::Remove(1),
                Call::Filter(Some("ST_NM = 'Kerala'".to_string())),
                Call::GoTo(
                    FlyTarget::Extent(zilla_data_processing::Extent::new(10.0, 0.0, 12.0, 2.0)),
                    6.0
                ),
            ]
        );
        assert_eq!(store.highlight(), None);

        let update = store.set_table_selection([CensusCode::from("102"), CensusCode::from("101")]);
        effects.apply(&update).await;
        assert_eq!(
            map.calls().last(),
            Some(&Call::Filter(Some(
                "ST_NM = 'Kerala' AND censuscode IN (101,102)".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn test_unchanged_filter_is_not_pushed_again() {
        let (store, map, effects) = setup(RecordingMap::default());

        effects.apply(&store.set_query("a")).await;
        effects.apply(&store.set_query("ab")).await;
        let filters = map
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Filter(_)))
            .count();
        assert_eq!(filters, 1);
    }

    #[tokio::test]
    async fn test_reset_clears_filter_highlight_and_goes_home() {
        let (store, map, effects) = setup(RecordingMap::default());
        effects.apply(&store.select_district("101").unwrap()).await;
        effects
            .apply(&store.set_table_selection([CensusCode::from("392")]))
            .await;

        let report = effects.apply(&store.reset()).await;
        assert!(report.is_clean(), "{report:?}");
        let calls = map.calls();
        assert_eq!(
            calls[calls.len() - 3..],
            [Call::Remove(1), Call::Filter(None), Call::GoHome]
        );
        assert_eq!(store.highlight(), None);
    }

    #[tokio::test]
    async fn test_superseded_district_effect_leaves_map_alone() {
        let (store, map, effects) = setup(RecordingMap::default());

        let first = store.select_district("101").unwrap();
        store.select_district("102").unwrap();
        let report = effects.apply(&first).await;

        assert!(report.superseded);
        assert!(report.failures.is_empty());
        assert!(map.calls().iter().all(|c| matches!(c, Call::Filter(_))));
        assert_eq!(store.highlight(), None);
    }
}
