//! Interfaces of the outside world the engine drives: the feature service
//! that answers attribute/extent queries and the map that flies, highlights,
//! shows popups and filters.
//!
//! Both traits are object safe and are held as `Arc<dyn ..>`. Commands that
//! animate the map are async; the rest are immediate.

use anyhow::anyhow;
use async_trait::async_trait;
use zilla_data_processing::{Extent, Feature, FeatureSet, Point, fields};

pub use error::SyncError;

use crate::{config::HomeView, filter::FilterExpr};

mod error {
    use thiserror::Error;

    /// Failures of collaborator calls. None of them is fatal: the store is
    /// left as it was and the caller may retry on the next event.
    #[derive(Error, Debug)]
    pub enum SyncError {
        #[error("Feature query failed: {0}")]
        TransientQuery(#[source] anyhow::Error),
        #[error("Map command `{effect}` failed: {source}")]
        Effect {
            effect: &'static str,
            #[source]
            source: anyhow::Error,
        },
    }
}

/// Opaque handle for one highlighted feature on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HighlightToken(u64);

impl HighlightToken {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Where the map should move to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlyTarget {
    Point(Point),
    Extent(Extent),
}

/// A feature-service query: attribute predicate, optional spatial extent,
/// requested attribute fields and whether geometry is wanted.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureQuery {
    pub filter: Option<FilterExpr>,
    pub extent: Option<Extent>,
    pub out_fields: Vec<String>,
    pub return_geometry: bool,
}

impl Default for FeatureQuery {
    fn default() -> Self {
        Self::all()
    }
}

impl FeatureQuery {
    /// Every feature, every district attribute, no geometry.
    pub fn all() -> Self {
        Self {
            filter: None,
            extent: None,
            out_fields: fields::ALL.iter().map(ToString::to_string).collect(),
            return_geometry: false,
        }
    }

    pub fn matching(filter: FilterExpr) -> Self {
        Self {
            filter: Some(filter),
            ..Self::all()
        }
    }

    pub fn within(extent: Extent) -> Self {
        Self {
            extent: Some(extent),
            ..Self::all()
        }
    }

    #[must_use]
    pub fn with_out_fields(mut self, fields: &[&str]) -> Self {
        self.out_fields = fields.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_geometry(mut self, return_geometry: bool) -> Self {
        self.return_geometry = return_geometry;
        self
    }

    /// The predicate as sent to the service; `1=1` when unfiltered.
    pub fn where_clause(&self) -> String {
        self.filter
            .as_ref()
            .map_or_else(|| "1=1".to_string(), ToString::to_string)
    }
}

#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn query(&self, query: FeatureQuery) -> anyhow::Result<FeatureSet>;
}

/// Feature services report failed queries as a successful response with an
/// `error` body; turn that into an error.
pub fn checked(result: anyhow::Result<FeatureSet>) -> anyhow::Result<FeatureSet> {
    let mut set = result?;
    match set.error.take() {
        Some(error) => Err(anyhow!(
            "service error {}: {}",
            error.code.map_or_else(|| "?".to_string(), |c| c.to_string()),
            error.message
        )),
        None => Ok(set),
    }
}

#[async_trait]
pub trait MapSurface: Send + Sync {
    async fn go_to(&self, target: FlyTarget, zoom: f64) -> anyhow::Result<()>;

    async fn go_home(&self, home: &HomeView) -> anyhow::Result<()>;

    fn highlight(&self, feature: &Feature) -> anyhow::Result<HighlightToken>;

    /// Must tolerate tokens that were already removed.
    fn remove_highlight(&self, token: HighlightToken) -> anyhow::Result<()>;

    fn show_popup(&self, feature: &Feature, anchor: Point) -> anyhow::Result<()>;

    /// `None` clears any filter.
    fn set_filter(&self, filter: Option<&FilterExpr>) -> anyhow::Result<()>;
}

/// A feature source answering from features held in memory.
///
/// Predicates are evaluated from the structured [`FilterExpr`], extents by
/// bounding-box intersection. Attributes are trimmed to `out_fields` and
/// geometry is dropped unless requested, like a remote service would.
#[derive(Debug, Clone, Default)]
pub struct MemoryFeatureSource {
    features: Vec<Feature>,
}

impl MemoryFeatureSource {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn run(&self, query: &FeatureQuery) -> FeatureSet {
        let wildcard = query.out_fields.iter().any(|f| f == "*");
        let features = self
            .features
            .iter()
            .filter(|f| query.filter.as_ref().is_none_or(|filter| filter.matches(f)))
            .filter(|f| {
                query.extent.as_ref().is_none_or(|extent| {
                    f.geometry
                        .as_ref()
                        .and_then(zilla_data_processing::Geometry::extent)
                        .is_some_and(|bbox| bbox.intersects(extent))
                })
            })
            .map(|f| {
                let attributes = f
                    .attributes
                    .iter()
                    .filter(|(key, _)| {
                        wildcard
                            || query
                                .out_fields
                                .iter()
                                .any(|field| field.eq_ignore_ascii_case(key))
                    })
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                let geometry = if query.return_geometry {
                    f.geometry.clone()
                } else {
                    None
                };
                Feature::new(attributes, geometry)
            })
            .collect();
        FeatureSet::new(features)
    }
}

impl From<FeatureSet> for MemoryFeatureSource {
    fn from(set: FeatureSet) -> Self {
        Self::new(set.features)
    }
}

#[async_trait]
impl FeatureSource for MemoryFeatureSource {
    async fn query(&self, query: FeatureQuery) -> anyhow::Result<FeatureSet> {
        Ok(self.run(&query))
    }
}
