//! ABOUTME: FunctionInvoker trait seam for the serverless invocation client
//! ABOUTME: The payload propagator is the only caller

use crate::error::Result;
use async_trait::async_trait;

/// Live serverless function invocation.
///
/// Given a function name and a string input, returns the function's string
/// output. Retries, if any, live inside implementations — the propagation
/// layer never retries.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    /// Invoke the named function with the given payload and return its
    /// response body.
    ///
    /// # Errors
    ///
    /// Returns [`StepTuneError::Invocation`](crate::StepTuneError::Invocation)
    /// when the invocation fails.
    async fn invoke(&self, function_name: &str, payload: &str) -> Result<String>;
}
