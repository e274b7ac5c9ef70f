use zilla_data_processing::Point;

use crate::{error::ZillaError, search::SearchConfig};

pub const MAX_ZOOM: f64 = 24.0;
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Where the map returns on reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeView {
    pub center: Point,
    pub zoom: f64,
}

impl Default for HomeView {
    /// Centre of India at country zoom.
    fn default() -> Self {
        Self {
            center: Point::new(78.96288, 20.593684),
            zoom: 5.0,
        }
    }
}

/// How selection changes move the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectsConfig {
    pub district_zoom: f64,
    pub state_zoom: f64,
    pub home: HomeView,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            district_zoom: 9.0,
            state_zoom: 6.0,
            home: HomeView::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinderConfig {
    pub search: SearchConfig,
    pub effects: EffectsConfig,
    /// Buffered selection-change events per subscriber
    pub event_capacity: usize,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            effects: EffectsConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl FinderConfig {
    pub fn validate(&self) -> Result<(), ZillaError> {
        if self.search.limit == 0 {
            return Err(ZillaError::ConfigError(
                "search limit must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ZillaError::ConfigError(
                "event capacity must be at least 1".to_string(),
            ));
        }
        for (name, zoom) in [
            ("district zoom", self.effects.district_zoom),
            ("state zoom", self.effects.state_zoom),
            ("home zoom", self.effects.home.zoom),
        ] {
            if !(0.0..=MAX_ZOOM).contains(&zoom) {
                return Err(ZillaError::ConfigError(format!(
                    "{name} {zoom} is outside 0..={MAX_ZOOM}"
                )));
            }
        }
        let Point { x, y } = self.effects.home.center;
        if !x.is_finite() || !y.is_finite() {
            return Err(ZillaError::ConfigError(
                "home center must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for finder configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct FinderConfigBuilder {
    config: FinderConfig,
}

impl FinderConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short suggestion lists for small screens
    pub fn compact() -> Self {
        Self::new().limit(3)
    }

    /// Longer suggestion lists
    pub fn detailed() -> Self {
        Self::new().limit(10)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.config.search.limit = limit;
        self
    }

    pub fn district_zoom(mut self, zoom: f64) -> Self {
        self.config.effects.district_zoom = zoom;
        self
    }

    pub fn state_zoom(mut self, zoom: f64) -> Self {
        self.config.effects.state_zoom = zoom;
        self
    }

    pub fn home(mut self, center: Point, zoom: f64) -> Self {
        self.config.effects.home = HomeView { center, zoom };
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build without validation.
    pub fn build(self) -> FinderConfig {
        self.config
    }

    pub fn try_build(self) -> Result<FinderConfig, ZillaError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let config = FinderConfigBuilder::new().build();
        assert_eq!(config, FinderConfig::default());
        assert_eq!(config.search.limit, 5);
        assert_eq!(config.effects.district_zoom, 9.0);
        assert_eq!(config.effects.state_zoom, 6.0);
        assert_eq!(config.effects.home.zoom, 5.0);
        assert_eq!(config.effects.home.center, Point::new(78.96288, 20.593684));
    }

    #[test]
    fn test_presets() {
        assert_eq!(FinderConfigBuilder::compact().build().search.limit, 3);
        assert_eq!(FinderConfigBuilder::detailed().build().search.limit, 10);
    }

    #[test]
    fn test_method_chaining_overrides_presets() {
        let config = FinderConfigBuilder::compact()
            .limit(7)
            .district_zoom(11.0)
            .home(Point::new(76.0, 10.0), 7.0)
            .event_capacity(8)
            .try_build()
            .unwrap();

        assert_eq!(config.search.limit, 7);
        assert_eq!(config.effects.district_zoom, 11.0);
        assert_eq!(config.effects.state_zoom, 6.0);
        assert_eq!(config.effects.home.center, Point::new(76.0, 10.0));
        assert_eq!(config.event_capacity, 8);
    }

    #[test]
    fn test_validation() {
        assert!(FinderConfigBuilder::new().limit(0).try_build().is_err());
        assert!(FinderConfigBuilder::new().event_capacity(0).try_build().is_err());
        assert!(FinderConfigBuilder::new().state_zoom(30.0).try_build().is_err());
        assert!(FinderConfigBuilder::new().district_zoom(-1.0).try_build().is_err());
        assert!(FinderConfigBuilder::new()
            .home(Point::new(f64::NAN, 0.0), 5.0)
            .try_build()
            .is_err());

        let err = FinderConfigBuilder::new().limit(0).try_build().unwrap_err();
        assert!(matches!(err, ZillaError::ConfigError(msg) if msg.contains("limit")));
    }
}
