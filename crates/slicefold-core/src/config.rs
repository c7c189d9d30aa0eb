//! Composition run configuration.
//!
//! Provides [`ComposeConfig`], which carries the chunking, pacing and cleanup
//! parameters the composer and cleanup dispatcher honor. The provider's
//! compose ceiling is not configured here; it belongs to the storage gateway. Values are loaded
//! from environment variables or assembled with the typed builder.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::SliceFoldError;

/// Configuration for a composition run.
///
/// Defaults match Cloud Storage limits: a chunk of 31 slices plus the
/// accumulator fills one 32-source compose call, and an object may be
/// mutated roughly once per second.
///
/// # Examples
///
/// ```
/// use slicefold_core::ComposeConfig;
///
/// let config = ComposeConfig::default();
/// assert_eq!(config.chunk_size, 31);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ComposeConfig {
    /// Number of slices folded per compose call (the accumulator is added on top).
    #[builder(default = 31)]
    pub chunk_size: usize,

    /// Minimum time between two mutations of the accumulator, in milliseconds.
    #[builder(default = 1_000)]
    pub min_mutation_interval_ms: u64,

    /// Maximum number of slice deletions in flight at once.
    #[builder(default = 16)]
    pub cleanup_concurrency: usize,

    /// Delay between submitting two deletions to the pool, in milliseconds.
    #[builder(default = 5)]
    pub dispatch_delay_ms: u64,

    /// Whether folded slices are deleted at all.
    #[builder(default = true)]
    pub delete_slices: bool,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            chunk_size: 31,
            min_mutation_interval_ms: 1_000,
            cleanup_concurrency: 16,
            dispatch_delay_ms: 5,
            delete_slices: true,
            log_level: String::from("info"),
        }
    }
}

impl ComposeConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults;
    /// values that fail to parse are ignored):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `SLICEFOLD_CHUNK_SIZE` | `31` |
    /// | `SLICEFOLD_MIN_MUTATION_INTERVAL_MS` | `1000` |
    /// | `SLICEFOLD_CLEANUP_CONCURRENCY` | `16` |
    /// | `SLICEFOLD_DISPATCH_DELAY_MS` | `5` |
    /// | `SLICEFOLD_DELETE_SLICES` | `true` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_parse("SLICEFOLD_CHUNK_SIZE") {
            config.chunk_size = n;
        }
        if let Some(n) = env_parse("SLICEFOLD_MIN_MUTATION_INTERVAL_MS") {
            config.min_mutation_interval_ms = n;
        }
        if let Some(n) = env_parse("SLICEFOLD_CLEANUP_CONCURRENCY") {
            config.cleanup_concurrency = n;
        }
        if let Some(n) = env_parse("SLICEFOLD_DISPATCH_DELAY_MS") {
            config.dispatch_delay_ms = n;
        }
        if let Ok(v) = std::env::var("SLICEFOLD_DELETE_SLICES") {
            config.delete_slices = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Check the values that are invalid regardless of the gateway.
    ///
    /// Whether a chunk plus the accumulator fits one compose call depends on
    /// the gateway and is checked by the composer.
    ///
    /// # Errors
    /// Returns [`SliceFoldError::Config`] if the chunk size is zero or the
    /// cleanup pool has no workers.
    pub fn validate(&self) -> Result<(), SliceFoldError> {
        if self.chunk_size == 0 {
            return Err(SliceFoldError::Config("chunk_size must be positive".into()));
        }
        if self.cleanup_concurrency == 0 {
            return Err(SliceFoldError::Config(
                "cleanup_concurrency must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Minimum time between two mutations of the accumulator.
    #[must_use]
    pub fn min_mutation_interval(&self) -> Duration {
        Duration::from_millis(self.min_mutation_interval_ms)
    }

    /// Delay between two deletion submissions.
    #[must_use]
    pub fn dispatch_delay(&self) -> Duration {
        Duration::from_millis(self.dispatch_delay_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let v = std::env::var(key).ok()?;
    match v.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value = %v, "ignoring unparseable configuration value");
            None
        }
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_default_config() {
        let config = ComposeConfig::default();
        assert_eq!(config.chunk_size, 31);
        assert_eq!(config.min_mutation_interval(), Duration::from_secs(1));
        assert_eq!(config.cleanup_concurrency, 16);
        assert_eq!(config.dispatch_delay(), Duration::from_millis(5));
        assert!(config.delete_slices);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_should_load_from_env() {
        let config = ComposeConfig::from_env();
        assert!(config.chunk_size > 0);
    }

    #[test]
    fn test_should_build_with_typed_builder() {
        let config = ComposeConfig::builder()
            .chunk_size(4)
            .min_mutation_interval_ms(10)
            .cleanup_concurrency(2)
            .dispatch_delay_ms(0)
            .delete_slices(false)
            .log_level("debug".into())
            .build();

        assert_eq!(config.chunk_size, 4);
        assert_eq!(config.min_mutation_interval(), Duration::from_millis(10));
        assert_eq!(config.cleanup_concurrency, 2);
        assert!(config.dispatch_delay().is_zero());
        assert!(!config.delete_slices);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_should_default_builder_to_default_config() {
        assert_eq!(ComposeConfig::builder().build(), ComposeConfig::default());
    }

    #[test]
    fn test_should_reject_zero_chunk_size() {
        let config = ComposeConfig::builder().chunk_size(0).build();
        assert!(matches!(config.validate(), Err(SliceFoldError::Config(_))));
    }

    #[test]
    fn test_should_leave_compose_ceiling_to_gateway() {
        let config = ComposeConfig::builder().chunk_size(64).build();
        assert!(config.validate().is_ok());

        let json = serde_json::to_string(&config).expect("test serialization");
        assert!(!json.contains("maxComposeInputs"));
    }

    #[test]
    fn test_should_reject_empty_cleanup_pool() {
        let config = ComposeConfig::builder().cleanup_concurrency(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_should_serialize_to_camel_case_json() {
        let config = ComposeConfig::default();
        let json = serde_json::to_string(&config).expect("test serialization");
        assert!(json.contains("chunkSize"));
        assert!(json.contains("minMutationIntervalMs"));
    }

    #[test]
    fn test_should_parse_bool_values() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
    }
}
