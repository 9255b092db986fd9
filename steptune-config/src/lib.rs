//! ABOUTME: Central configuration management for steptune
//! ABOUTME: Handles TOML/JSON parsing, validation, and builder construction

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use steptune_core::StepTuneError;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Central steptune configuration.
///
/// Mirrors the shape consumed by the orchestrator: the workflow identity, the
/// representative payloads, the sampler pass-through knobs, and the
/// escalation parameters.
///
/// # Examples
///
/// ```
/// use steptune_config::SteptuneConfig;
///
/// let config = SteptuneConfig::from_toml(r#"
///     arn = "arn:aws:states:us-west-2:123456789012:stateMachine:Pipeline"
///     region = "us-west-2"
///     memory_size_increment = 128
///     constraint_execution_time_threshold = 2000.0
///
///     [[payloads]]
///     payload = '{"items": [1, 2, 3]}'
/// "#).unwrap();
/// assert_eq!(config.memory_size_increment, 128);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SteptuneConfig {
    /// Workflow identifier (opaque string)
    pub arn: String,
    /// Cloud region (opaque string)
    pub region: String,
    /// Escalator step size on the memory axis, in MB
    pub memory_size_increment: u32,
    /// End-to-end execution-time threshold in ms; unset makes the escalator
    /// a no-op
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_execution_time_threshold: Option<f64>,
    /// What to do when one payload's optimization fails
    pub on_payload_failure: FailurePolicy,
    /// How results across payloads are combined
    pub aggregation: AggregationPolicy,
    /// Representative top-level payloads, optimized one at a time
    pub payloads: Vec<PayloadEntry>,
    /// Knobs passed through to the sampler
    pub sampling: SamplingConfig,
}

impl Default for SteptuneConfig {
    fn default() -> Self {
        Self {
            arn: String::new(),
            region: String::new(),
            memory_size_increment: 128,
            constraint_execution_time_threshold: None,
            on_payload_failure: FailurePolicy::default(),
            aggregation: AggregationPolicy::default(),
            payloads: Vec::new(),
            sampling: SamplingConfig::default(),
        }
    }
}

/// One representative top-level payload
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PayloadEntry {
    pub payload: String,
}

/// Sampler pass-through configuration.
///
/// These knobs are owned by the external sampling library; steptune only
/// carries them to sampler construction.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    pub termination_threshold: f64,
    pub max_total_sample_count: u32,
    pub min_sample_per_config: u32,
    pub dynamic_sampling_params: DynamicSamplingParams,
    pub max_number_of_invocation_attempts: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            termination_threshold: 3.0,
            max_total_sample_count: 20,
            min_sample_per_config: 4,
            dynamic_sampling_params: DynamicSamplingParams::default(),
            max_number_of_invocation_attempts: 5,
        }
    }
}

/// Dynamic sampling tuning forwarded to the sampler
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DynamicSamplingParams {
    pub max_sample_count: u32,
    pub coefficient_of_variation_threshold: f64,
}

impl Default for DynamicSamplingParams {
    fn default() -> Self {
        Self {
            max_sample_count: 8,
            coefficient_of_variation_threshold: 0.05,
        }
    }
}

/// What the orchestrator does when a payload's optimization fails
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort the whole run on the first failed payload
    #[default]
    Abort,
    /// Log the failure and continue with the remaining payloads
    Skip,
}

/// How per-payload results are combined
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// One independent report per payload
    #[default]
    Independent,
    /// Additionally combine reports by taking the maximum memory chosen per
    /// function across payloads
    MaxMemoryPerFunction,
}

impl SteptuneConfig {
    /// Create a new builder for `SteptuneConfig`
    #[must_use]
    pub fn builder() -> SteptuneConfigBuilder {
        SteptuneConfigBuilder::new()
    }

    /// Load configuration from a TOML file with validation
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, parsed, or validated.
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml(&content)
    }

    /// Parse TOML content with validation
    ///
    /// # Errors
    ///
    /// Returns an error when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON content with validation
    ///
    /// # Errors
    ///
    /// Returns an error when parsing or validation fails.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field-level constraints
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size_increment == 0 {
            return Err(ConfigError::Validation {
                field: Some("memory_size_increment".to_string()),
                message: "memory size increment must be greater than zero".to_string(),
            });
        }
        if let Some(threshold) = self.constraint_execution_time_threshold {
            if !threshold.is_finite() || threshold <= 0.0 {
                return Err(ConfigError::Validation {
                    field: Some("constraint_execution_time_threshold".to_string()),
                    message: "execution time threshold must be a positive number".to_string(),
                });
            }
        }
        if self.payloads.is_empty() {
            return Err(ConfigError::Validation {
                field: Some("payloads".to_string()),
                message: "at least one representative payload is required".to_string(),
            });
        }
        self.sampling.validate()
    }
}

impl SamplingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.min_sample_per_config == 0 {
            return Err(ConfigError::Validation {
                field: Some("sampling.min_sample_per_config".to_string()),
                message: "minimum samples per configuration must be at least 1".to_string(),
            });
        }
        if self.max_total_sample_count < self.min_sample_per_config {
            return Err(ConfigError::Validation {
                field: Some("sampling.max_total_sample_count".to_string()),
                message: "total sample budget is below the per-configuration minimum".to_string(),
            });
        }
        if self.max_number_of_invocation_attempts == 0 {
            return Err(ConfigError::Validation {
                field: Some("sampling.max_number_of_invocation_attempts".to_string()),
                message: "at least one invocation attempt is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for `SteptuneConfig`
#[derive(Debug, Clone, Default)]
pub struct SteptuneConfigBuilder {
    config: SteptuneConfig,
}

impl SteptuneConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn arn(mut self, arn: impl Into<String>) -> Self {
        self.config.arn = arn.into();
        self
    }

    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    /// Append one representative payload
    #[must_use]
    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.config.payloads.push(PayloadEntry {
            payload: payload.into(),
        });
        self
    }

    #[must_use]
    pub const fn memory_size_increment(mut self, increment_mb: u32) -> Self {
        self.config.memory_size_increment = increment_mb;
        self
    }

    #[must_use]
    pub const fn constraint_execution_time_threshold(mut self, threshold_ms: f64) -> Self {
        self.config.constraint_execution_time_threshold = Some(threshold_ms);
        self
    }

    #[must_use]
    pub fn sampling(mut self, sampling: SamplingConfig) -> Self {
        self.config.sampling = sampling;
        self
    }

    #[must_use]
    pub const fn on_payload_failure(mut self, policy: FailurePolicy) -> Self {
        self.config.on_payload_failure = policy;
        self
    }

    #[must_use]
    pub const fn aggregation(mut self, policy: AggregationPolicy) -> Self {
        self.config.aggregation = policy;
        self
    }

    /// Validate and produce the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` when a field constraint is violated.
    pub fn build(self) -> Result<SteptuneConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration-layer errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed in field '{field:?}': {message}")]
    Validation {
        field: Option<String>,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("General error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<ConfigError> for StepTuneError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, message } => Self::Configuration { message, field },
            _ => Self::Configuration {
                message: err.to_string(),
                field: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SteptuneConfig::default();
        assert_eq!(config.memory_size_increment, 128);
        assert!(config.constraint_execution_time_threshold.is_none());
        assert_eq!(config.on_payload_failure, FailurePolicy::Abort);
        assert_eq!(config.aggregation, AggregationPolicy::Independent);
        assert_eq!(config.sampling.max_total_sample_count, 20);
    }

    #[test]
    fn test_from_toml_full() {
        let config = SteptuneConfig::from_toml(
            r#"
            arn = "arn:aws:states:us-west-2:123:stateMachine:Video"
            region = "us-west-2"
            memory_size_increment = 256
            constraint_execution_time_threshold = 1500.0
            on_payload_failure = "skip"
            aggregation = "max-memory-per-function"

            [sampling]
            termination_threshold = 2.0
            max_total_sample_count = 30
            min_sample_per_config = 3
            max_number_of_invocation_attempts = 6

            [sampling.dynamic_sampling_params]
            max_sample_count = 10
            coefficient_of_variation_threshold = 0.1

            [[payloads]]
            payload = '{"video": "a.mp4"}'

            [[payloads]]
            payload = '{"video": "b.mp4"}'
            "#,
        )
        .unwrap();

        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.payloads.len(), 2);
        assert_eq!(config.memory_size_increment, 256);
        assert_eq!(config.on_payload_failure, FailurePolicy::Skip);
        assert_eq!(config.aggregation, AggregationPolicy::MaxMemoryPerFunction);
        assert!((config.sampling.termination_threshold - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.sampling.dynamic_sampling_params.max_sample_count, 10);
    }

    #[test]
    fn test_from_json() {
        let config = SteptuneConfig::from_json(
            r#"{
                "arn": "arn:x",
                "region": "eu-west-1",
                "payloads": [{"payload": "{}"}],
                "memory_size_increment": 64
            }"#,
        )
        .unwrap();
        assert_eq!(config.memory_size_increment, 64);
        assert_eq!(config.payloads[0].payload, "{}");
    }

    #[test]
    fn test_zero_increment_rejected() {
        let result = SteptuneConfig::builder()
            .payload("{}")
            .memory_size_increment(0)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { field: Some(f), .. }) if f == "memory_size_increment"
        ));
    }

    #[test]
    fn test_empty_payloads_rejected() {
        let result = SteptuneConfig::builder().arn("arn:x").build();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { field: Some(f), .. }) if f == "payloads"
        ));
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let result = SteptuneConfig::builder()
            .payload("{}")
            .constraint_execution_time_threshold(-5.0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_sampling_budget_consistency() {
        let sampling = SamplingConfig {
            max_total_sample_count: 2,
            min_sample_per_config: 4,
            ..SamplingConfig::default()
        };
        let result = SteptuneConfig::builder()
            .payload("{}")
            .sampling(sampling)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::Validation { field: Some(f), .. })
                if f == "sampling.max_total_sample_count"
        ));
    }

    #[test]
    fn test_config_error_converts_to_core_error() {
        let err = ConfigError::Validation {
            field: Some("payloads".to_string()),
            message: "empty".to_string(),
        };
        let core: StepTuneError = err.into();
        assert!(matches!(
            core,
            StepTuneError::Configuration { field: Some(f), .. } if f == "payloads"
        ));
    }

    #[test]
    fn test_builder_round_trip_through_toml() {
        let config = SteptuneConfig::builder()
            .arn("arn:aws:states:us-east-1:42:stateMachine:Etl")
            .region("us-east-1")
            .payload(r#"{"items": []}"#)
            .constraint_execution_time_threshold(900.0)
            .build()
            .unwrap();

        let serialized = toml::to_string(&config).unwrap();
        let reparsed = SteptuneConfig::from_toml(&serialized).unwrap();
        assert_eq!(reparsed.arn, config.arn);
        assert_eq!(reparsed.payloads, config.payloads);
        assert_eq!(
            reparsed.constraint_execution_time_threshold,
            config.constraint_execution_time_threshold
        );
    }
}
