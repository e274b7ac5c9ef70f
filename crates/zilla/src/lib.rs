//! Zilla - District Finder and Selection Sync
//!
//! Zilla lets a user find Indian districts by typing, by panning a map or by
//! picking rows in a table, and keeps all of those views agreeing on one
//! selection. Typing gets population-aware suggestions; picking one flies the
//! map there and highlights it; the map's visible area defines what the table
//! lists; table picks and state selections become the map's layer filter.
//!
//! # Quick Start
//!
//! ```rust
//! use zilla::{DistrictIndex, SearchConfig, data_processing::DistrictRecord, search};
//!
//! let index = DistrictIndex::new(vec![
//!     DistrictRecord::new("521", "Pune", "Maharashtra", Some(9_429_408)),
//!     DistrictRecord::new("392", "Puri", "Odisha", Some(1_698_730)),
//!     DistrictRecord::new("518", "Mumbai", "Maharashtra", Some(3_085_411)),
//! ])?;
//!
//! let suggestions = search(&index, "pu", None, &SearchConfig::default());
//! assert_eq!(suggestions[0].label(), "Pune");
//! assert_eq!(suggestions[1].label(), "Puri");
//! # Ok::<(), zilla::error::ZillaError>(())
//! ```
//!
//! The map and the feature service are reached through the
//! [`MapSurface`] and [`FeatureSource`] traits; a [`DistrictFinder`] drives
//! them from the selection store.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod collaborators;
mod config;
mod core;
pub mod effects;
pub mod error;
pub mod filter;
mod index;
mod search;
pub mod store;
pub mod viewport;

pub use core::DistrictFinder;

pub use collaborators::{
    FeatureQuery, FeatureSource, FlyTarget, HighlightToken, MapSurface, MemoryFeatureSource,
    SyncError,
};
pub use config::{EffectsConfig, FinderConfig, FinderConfigBuilder, HomeView};
pub use effects::{EffectReport, SelectionEffects};
pub use filter::FilterExpr;
pub use index::{DistrictIndex, IndexError};
pub use search::{Candidate, CandidateKind, MatchScore, SearchConfig, normalize_query, search};
pub use store::{
    SelectionChange, SelectionKind, SelectionState, SelectionStore, StoreError, StoreUpdate,
    VisibleOutcome,
};
pub use viewport::{ViewportReconciler, ViewportTicket};
pub use zilla_data_processing as data_processing;
pub use zilla_data_processing::{CensusCode, DataSource, DistrictRecord, Extent, Point};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Zilla library.
///
/// Installs a `tracing` fmt subscriber once per process. `RUST_LOG` takes
/// precedence over `level`; polars and reqwest are kept at `warn`.
///
/// ```rust
/// use tracing::Level;
/// use zilla::init_logging;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), zilla::error::ZillaError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::ZillaError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("polars=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        setup_test_env();
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }

    #[test]
    fn test_initialize_from_test_data() {
        setup_test_env();

        let finder = DistrictFinder::initialize(
            &DataSource::TestData(data_processing::TestDataConfig::sample()),
            std::sync::Arc::new(MemoryFeatureSource::default()),
            std::sync::Arc::new(NoMap),
            FinderConfig::default(),
        )
        .unwrap();

        assert_eq!(
            finder.index().len(),
            data_processing::TestDataConfig::sample().districts
        );
        let popular = finder.suggestions();
        assert_eq!(popular.len(), 5);
        assert_eq!(popular[0].label(), "Thane");
    }

    #[test]
    fn test_invalid_config_is_rejected_before_loading() {
        let result = DistrictFinder::initialize(
            &DataSource::TestData(data_processing::TestDataConfig::minimal()),
            std::sync::Arc::new(MemoryFeatureSource::default()),
            std::sync::Arc::new(NoMap),
            FinderConfigBuilder::new().limit(0).build(),
        );
        assert!(matches!(result, Err(error::ZillaError::ConfigError(_))));
    }

    struct NoMap;

    #[async_trait::async_trait]
    impl MapSurface for NoMap {
        async fn go_to(&self, _: FlyTarget, _: f64) -> anyhow::Result<()> {
            Ok(())
        }

        async fn go_home(&self, _: &HomeView) -> anyhow::Result<()> {
            Ok(())
        }

        fn highlight(
            &self,
            _: &data_processing::Feature,
        ) -> anyhow::Result<HighlightToken> {
            Ok(HighlightToken::new(0))
        }

        fn remove_highlight(&self, _: HighlightToken) -> anyhow::Result<()> {
            Ok(())
        }

        fn show_popup(&self, _: &data_processing::Feature, _: Point) -> anyhow::Result<()> {
            Ok(())
        }

        fn set_filter(&self, _: Option<&FilterExpr>) -> anyhow::Result<()> {
            Ok(())
        }
    }
}
