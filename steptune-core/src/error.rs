//! ABOUTME: Error types and handling for steptune
//! ABOUTME: Provides the StepTuneError enum and Result type alias

use thiserror::Error;

/// Comprehensive error enum for all steptune operations.
///
/// Every failure surfaced to callers is one of these variants; worker-pool
/// errors are captured and re-raised on the aggregating future, so the
/// orchestrator only ever sees this type.
#[derive(Debug, Error)]
pub enum StepTuneError {
    /// A workflow definition could not be translated into the in-memory model.
    #[error("Definition error: {message}")]
    Definition {
        message: String,
        /// Name of the state the error was detected at, when known
        state: Option<String>,
    },

    /// Payload propagation through a live workflow failed.
    #[error("Propagation error: {message}")]
    Propagation {
        message: String,
        /// Name of the offending state
        state: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A live serverless function invocation failed.
    #[error("Invocation error for function '{function}': {message}")]
    Invocation {
        message: String,
        function: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The sampler failed while fitting a function's performance curve.
    #[error("Optimization error: {message}")]
    Optimization {
        message: String,
        /// Function being optimized when the error occurred
        function: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The escalator cannot meet the execution-time constraint because every
    /// critical-path task is at its memory cap.
    #[error("Execution time threshold of {threshold_ms}ms is infeasible: {message}")]
    Infeasible { message: String, threshold_ms: f64 },

    /// Configuration parsing or validation failed.
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

impl StepTuneError {
    /// Propagation error tagged with the offending state name
    pub fn propagation(message: impl Into<String>, state: impl Into<String>) -> Self {
        Self::Propagation {
            message: message.into(),
            state: Some(state.into()),
            source: None,
        }
    }

    /// Definition error tagged with the state it was detected at
    pub fn definition(message: impl Into<String>, state: impl Into<String>) -> Self {
        Self::Definition {
            message: message.into(),
            state: Some(state.into()),
        }
    }
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, StepTuneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = StepTuneError::propagation("branch worker failed", "ProcessItems");
        assert!(err.to_string().contains("branch worker failed"));

        let err = StepTuneError::Infeasible {
            message: "all critical-path tasks at memory cap".to_string(),
            threshold_ms: 50.0,
        };
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_invocation_error_names_function() {
        let err = StepTuneError::Invocation {
            message: "timed out".to_string(),
            function: "resize-image".to_string(),
            source: None,
        };
        assert!(err.to_string().contains("resize-image"));
    }
}
