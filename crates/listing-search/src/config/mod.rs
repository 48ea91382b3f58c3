use crate::error::ListingSearchError;

/// Text similarity function used for fuzzy matching and relevance ranking.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityMetric {
    /// Trigram set overlap (the `pg_trgm` `similarity` function).
    #[default]
    Trigram,
    /// Normalised Indel similarity over the whole strings.
    Indel,
}

/// Engine-wide limits and thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Page size when the caller does not ask for one
    pub default_page_size: usize,
    /// Upper bound on any requested page size
    pub max_page_size: usize,
    /// Minimum similarity (inclusive) for a fuzzy text match
    pub similarity_threshold: f64,
    pub similarity_metric: SimilarityMetric,
    /// Row cap for fast-path queries when the requested one is absent or out of range
    pub fast_path_default_limit: usize,
    /// Largest row cap a fast-path or map-search caller may request
    pub fast_path_max_limit: usize,
    /// Row cap for map searches when the requested one is absent or out of range
    pub map_default_limit: usize,
    /// Radius for "near me" queries when the caller gives none, in meters
    pub default_radius_m: f64,
    /// Smaller radii are raised to this, in meters
    pub min_radius_m: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_page_size: 24,
            max_page_size: 100,
            similarity_threshold: 0.15,
            similarity_metric: SimilarityMetric::Trigram,
            fast_path_default_limit: 500,
            fast_path_max_limit: 1000,
            map_default_limit: 200,
            default_radius_m: 5000.0,
            min_radius_m: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

/// Builder for [`EngineConfig`] with presets and validated setters.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder with the marketplace defaults
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Smaller pages and fast-path caps for map-heavy, latency-sensitive clients
    pub fn interactive() -> Self {
        let mut builder = Self::new();
        builder.config.default_page_size = 12;
        builder.config.max_page_size = 48;
        builder.config.fast_path_default_limit = 200;
        builder.config.fast_path_max_limit = 500;
        builder
    }

    /// Fewer but closer fuzzy matches
    pub fn strict_text() -> Self {
        let mut builder = Self::new();
        builder.config.similarity_threshold = 0.3;
        builder
    }

    /// Set the default and maximum page size
    pub fn page_size(mut self, default: usize, max: usize) -> Result<Self, ListingSearchError> {
        if default == 0 || default > max {
            return Err(ListingSearchError::ConfigError(format!(
                "Page size default must be in 1..={max}, got {default}"
            )));
        }
        self.config.default_page_size = default;
        self.config.max_page_size = max;
        Ok(self)
    }

    /// Set the inclusive fuzzy-match threshold
    pub fn similarity_threshold(mut self, threshold: f64) -> Result<Self, ListingSearchError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ListingSearchError::ConfigError(format!(
                "Similarity threshold must be within [0, 1], got {threshold}"
            )));
        }
        self.config.similarity_threshold = threshold;
        Ok(self)
    }

    pub fn similarity_metric(mut self, metric: SimilarityMetric) -> Self {
        self.config.similarity_metric = metric;
        self
    }

    /// Set the default and maximum fast-path row cap
    pub fn fast_path_limits(
        mut self,
        default: usize,
        max: usize,
    ) -> Result<Self, ListingSearchError> {
        if default == 0 || default > max {
            return Err(ListingSearchError::ConfigError(format!(
                "Fast-path default limit must be in 1..={max}, got {default}"
            )));
        }
        self.config.fast_path_default_limit = default;
        self.config.fast_path_max_limit = max;
        Ok(self)
    }

    /// Set the map-search row cap used when the caller gives none or an out-of-range one
    pub fn map_default_limit(mut self, default: usize) -> Result<Self, ListingSearchError> {
        if default == 0 || default > self.config.fast_path_max_limit {
            return Err(ListingSearchError::ConfigError(format!(
                "Map default limit must be in 1..={}, got {default}",
                self.config.fast_path_max_limit
            )));
        }
        self.config.map_default_limit = default;
        Ok(self)
    }

    /// Set the radius used when a "near me" query gives none, in meters
    pub fn default_radius(mut self, meters: f64) -> Result<Self, ListingSearchError> {
        if !meters.is_finite() || meters < self.config.min_radius_m {
            return Err(ListingSearchError::ConfigError(format!(
                "Default radius must be at least {} m, got {meters}",
                self.config.min_radius_m
            )));
        }
        self.config.default_radius_m = meters;
        Ok(self)
    }

    /// Build the final configuration
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let config = EngineConfigBuilder::new().build();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_page_size, 24);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.similarity_threshold, 0.15);
        assert_eq!(config.similarity_metric, SimilarityMetric::Trigram);
        assert_eq!(config.fast_path_default_limit, 500);
        assert_eq!(config.fast_path_max_limit, 1000);
        assert_eq!(config.default_radius_m, 5000.0);
        assert_eq!(config.map_default_limit, 200);
    }

    #[test]
    fn test_interactive_preset() {
        let config = EngineConfigBuilder::interactive().build();
        assert_eq!(config.default_page_size, 12);
        assert_eq!(config.max_page_size, 48);
        assert_eq!(config.fast_path_default_limit, 200);
        assert_eq!(config.similarity_threshold, 0.15);
    }

    #[test]
    fn test_strict_text_preset() {
        let config = EngineConfigBuilder::strict_text().build();
        assert_eq!(config.similarity_threshold, 0.3);
        assert_eq!(config.default_page_size, 24);
    }

    #[test]
    fn test_page_size_validation() {
        assert!(EngineConfig::builder().page_size(10, 50).is_ok());
        assert!(EngineConfig::builder().page_size(0, 50).is_err());
        assert!(EngineConfig::builder().page_size(60, 50).is_err());
    }

    #[test]
    fn test_similarity_threshold_validation() {
        assert!(EngineConfig::builder().similarity_threshold(0.0).is_ok());
        assert!(EngineConfig::builder().similarity_threshold(1.0).is_ok());
        assert!(EngineConfig::builder().similarity_threshold(-0.1).is_err());
        assert!(EngineConfig::builder().similarity_threshold(f64::NAN).is_err());
    }

    #[test]
    fn test_radius_and_limits_validation() {
        assert!(EngineConfig::builder().default_radius(0.5).is_err());
        assert!(EngineConfig::builder().default_radius(f64::INFINITY).is_err());
        assert!(EngineConfig::builder().fast_path_limits(600, 500).is_err());

        let config = EngineConfig::builder()
            .default_radius(2500.0)
            .unwrap()
            .fast_path_limits(100, 200)
            .unwrap()
            .build();
        assert_eq!(config.default_radius_m, 2500.0);
        assert_eq!(config.fast_path_default_limit, 100);
        assert_eq!(config.fast_path_max_limit, 200);
    }

    #[test]
    fn test_map_default_limit_validation() {
        assert!(EngineConfig::builder().map_default_limit(0).is_err());
        assert!(EngineConfig::builder().map_default_limit(1001).is_err());
        let config = EngineConfig::builder().map_default_limit(50).unwrap().build();
        assert_eq!(config.map_default_limit, 50);
    }

    #[test]
    fn test_override_presets() {
        let config = EngineConfigBuilder::interactive()
            .similarity_metric(SimilarityMetric::Indel)
            .page_size(20, 40)
            .unwrap()
            .build();

        assert_eq!(config.similarity_metric, SimilarityMetric::Indel);
        assert_eq!(config.default_page_size, 20);
        // Kept from the preset
        assert_eq!(config.fast_path_default_limit, 200);
    }
}
