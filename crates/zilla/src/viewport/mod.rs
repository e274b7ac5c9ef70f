use std::sync::Arc;

use tracing::{debug, instrument, warn};
use zilla_data_processing::{Extent, FeatureSet, fields};

use crate::{
    collaborators::{FeatureQuery, FeatureSource, SyncError, checked},
    store::{SelectionStore, VisibleOutcome},
};

/// A viewport event in flight: the generation it was issued under and the
/// extent it asked about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTicket {
    generation: u64,
    extent: Extent,
}

impl ViewportTicket {
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn extent(&self) -> Extent {
        self.extent
    }
}

/// Turns "the map stopped moving" into the set of visible districts.
///
/// Each event bumps the store's viewport generation; a query result is only
/// applied if no newer event started while it was outstanding.
pub struct ViewportReconciler {
    store: Arc<SelectionStore>,
    source: Arc<dyn FeatureSource>,
}

impl ViewportReconciler {
    pub fn new(store: Arc<SelectionStore>, source: Arc<dyn FeatureSource>) -> Self {
        Self { store, source }
    }

    pub fn begin(&self, extent: Extent) -> ViewportTicket {
        ViewportTicket {
            generation: self.store.next_viewport_generation(),
            extent,
        }
    }

    pub fn complete(&self, ticket: ViewportTicket, features: &FeatureSet) -> VisibleOutcome {
        let outcome = self
            .store
            .set_visible(ticket.generation, features.census_codes());
        if let VisibleOutcome::Stale { generation, current } = outcome {
            debug!(generation, current, "Viewport result superseded");
        }
        outcome
    }

    /// Query the districts intersecting `extent` and apply them as the
    /// visible set. On failure the visible set is left as it was.
    #[instrument(name = "Viewport idle", level = "debug", skip_all)]
    pub async fn on_viewport_idle(&self, extent: Extent) -> Result<VisibleOutcome, SyncError> {
        let ticket = self.begin(extent);
        let query = FeatureQuery::within(extent)
            .with_out_fields(&fields::IDENTIFIERS)
            .with_geometry(false);

        let features = checked(self.source.query(query).await).map_err(|e| {
            warn!(generation = ticket.generation, error = %e, "Viewport query failed");
            SyncError::TransientQuery(e)
        })?;

        Ok(self.complete(ticket, &features))
    }
}
