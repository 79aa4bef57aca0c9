use crate::error::{GymIntelError, Result};
use serde::Deserialize;
use std::fs;

/// Application configuration loaded from `config.toml`.
///
/// Scoring and clustering thresholds are deliberately configuration rather
/// than literals so matching behavior can be tuned and tested in isolation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub scoring: ScoringPolicy,
    pub clustering: ClusteringConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory the daily-rolled JSON log files land in
    pub directory: String,
    /// File name prefix for the rolled logs
    pub file_prefix: String,
    /// Filter directive applied when RUST_LOG is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_prefix: "gymintel.log".to_string(),
            default_filter: "gymintel_scraper=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Default search radius in miles
    pub default_radius_miles: f64,
    /// Persisted data younger than this is served without a fresh fetch
    pub freshness_max_age_seconds: i64,
    /// Timeout applied to each individual provider call
    pub provider_timeout_seconds: u64,
    /// Aggregate fetch deadline; settles with whatever providers completed
    pub aggregate_timeout_seconds: u64,
    /// How long a joined caller waits on an owner's fetch before failing locally
    pub waiter_timeout_seconds: u64,
    /// Overall cap on one search pipeline run
    pub search_timeout_seconds: u64,
    /// Per-subscriber progress event buffer; oldest events drop on overflow
    pub progress_buffer_size: usize,
    /// Terminal search state is kept around this long for late subscribers
    pub progress_retention_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_radius_miles: 10.0,
            freshness_max_age_seconds: 7 * 24 * 60 * 60,
            provider_timeout_seconds: 20,
            aggregate_timeout_seconds: 60,
            waiter_timeout_seconds: 120,
            search_timeout_seconds: 300,
            progress_buffer_size: 32,
            progress_retention_seconds: 300,
        }
    }
}

/// Tunable weights for per-source and canonical confidence scoring
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Base confidence assigned to any listing a provider returned
    pub base_confidence: f64,
    /// How much field completeness contributes on top of the base
    pub completeness_weight: f64,
    /// Canonical confidence ceiling for entities seen by only one provider
    pub single_source_cap: f64,
    /// Reliability prior per provider, keyed by internal provider name
    pub provider_reliability: std::collections::HashMap<String, f64>,
    /// Field-selection priority, best first; earlier providers win conflicts
    pub provider_priority: Vec<String>,
    /// Match confidence assigned to clusters with a single member
    pub singleton_match_confidence: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let mut provider_reliability = std::collections::HashMap::new();
        provider_reliability.insert(crate::constants::GOOGLE_PLACES_PROVIDER.to_string(), 0.9);
        provider_reliability.insert(crate::constants::YELP_PROVIDER.to_string(), 0.85);
        provider_reliability.insert(crate::constants::OPENSTREETMAP_PROVIDER.to_string(), 0.6);

        Self {
            base_confidence: 0.4,
            completeness_weight: 0.35,
            single_source_cap: 0.85,
            provider_reliability,
            provider_priority: vec![
                crate::constants::GOOGLE_PLACES_PROVIDER.to_string(),
                crate::constants::YELP_PROVIDER.to_string(),
                crate::constants::OPENSTREETMAP_PROVIDER.to_string(),
            ],
            singleton_match_confidence: 0.5,
        }
    }
}

impl ScoringPolicy {
    /// Reliability prior for a provider; unknown providers get a cautious default
    pub fn reliability(&self, provider: &str) -> f64 {
        self.provider_reliability.get(provider).copied().unwrap_or(0.5)
    }

    /// Rank of a provider in the priority list (lower wins field conflicts)
    pub fn priority_rank(&self, provider: &str) -> usize {
        self.provider_priority
            .iter()
            .position(|p| p == provider)
            .unwrap_or(usize::MAX)
    }
}

/// Thresholds for clustering raw listings into one canonical entity.
/// The 150m / name-similarity defaults are reasonable starting points,
/// not contractual values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Listings farther apart than this never cluster
    pub max_match_distance_meters: f64,
    /// Name similarity below this never clusters regardless of proximity
    pub name_similarity_floor: f64,
    /// Combined similarity at or above this groups two listings
    pub match_threshold: f64,
    /// Weight of name similarity in the combined score
    pub name_weight: f64,
    /// Weight of geographic proximity in the combined score
    pub distance_weight: f64,
    /// Persisted entities within this distance are merge candidates on upsert
    pub upsert_match_distance_meters: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            max_match_distance_meters: 150.0,
            name_similarity_floor: 0.55,
            match_threshold: 0.65,
            name_weight: 0.6,
            distance_weight: 0.4,
            upsert_match_distance_meters: 150.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            scoring: ScoringPolicy::default(),
            clustering: ClusteringConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    pub fn load_from(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            GymIntelError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Load `config.toml` if present, otherwise fall back to defaults
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default configuration: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.search.freshness_max_age_seconds, 604_800);
        assert!(config.clustering.max_match_distance_meters > 0.0);
        assert!((config.clustering.name_weight + config.clustering.distance_weight - 1.0).abs() < 1e-9);
        assert!(config.scoring.single_source_cap < 1.0);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[search]
freshness_max_age_seconds = 3600

[clustering]
max_match_distance_meters = 200.0

[logging]
directory = "/var/log/gymintel"
"#
        )
        .unwrap();

        let config = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.search.freshness_max_age_seconds, 3600);
        assert_eq!(config.clustering.max_match_distance_meters, 200.0);
        assert_eq!(config.logging.directory, "/var/log/gymintel");
        // Untouched sections keep their defaults
        assert_eq!(config.search.provider_timeout_seconds, 20);
        assert_eq!(config.scoring.singleton_match_confidence, 0.5);
        assert_eq!(config.logging.file_prefix, "gymintel.log");
        assert_eq!(config.logging.default_filter, "gymintel_scraper=info");
    }

    #[test]
    fn test_provider_priority_rank() {
        let policy = ScoringPolicy::default();
        assert!(policy.priority_rank(crate::constants::GOOGLE_PLACES_PROVIDER)
            < policy.priority_rank(crate::constants::YELP_PROVIDER));
        assert_eq!(policy.priority_rank("unknown"), usize::MAX);
    }
}
