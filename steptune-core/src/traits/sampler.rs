//! ABOUTME: Sampler trait seam for the per-function performance-sampling library
//! ABOUTME: Defines the memory-axis and curve-fitting contract consumed by the optimizer

use crate::error::Result;
use crate::types::{PayloadFit, WeightedPayload};
use async_trait::async_trait;

/// Per-function performance sampler.
///
/// A sampler is obtained from a [`SamplerProvider`] for one specific function
/// and exposes that function's discrete memory axis. Fitting a weighted
/// payload returns the payload's cost-minimal memory size plus a fitted
/// duration curve, and adds the weighted cost vector for the payload into the
/// caller's `collective_costs` accumulator — the sampler owns the weighting.
///
/// # Implementation Requirements
///
/// - `memory_space` must be ordered ascending and non-empty
/// - `fit_payload` must add exactly `memory_space().len()` entries worth of
///   weighted cost into `collective_costs` (same indexing as the axis)
/// - the returned curve must be pure: same memory in, same duration out
#[async_trait]
pub trait Sampler: Send + Sync {
    /// The discrete memory axis for this function, ascending, in MB
    fn memory_space(&self) -> &[u32];

    /// Fit a curve for one weighted payload and fold its weighted cost vector
    /// into `collective_costs`.
    ///
    /// # Errors
    ///
    /// Returns an error when sampling or curve fitting fails for the payload.
    async fn fit_payload(
        &self,
        payload: &WeightedPayload,
        collective_costs: &mut [f64],
    ) -> Result<PayloadFit>;
}

/// Factory for per-function samplers.
///
/// The optimizer asks for one sampler per distinct function name; provider
/// implementations carry the sampling configuration (termination threshold,
/// sample counts, invocation attempt limits) handed to each sampler.
#[async_trait]
pub trait SamplerProvider: Send + Sync {
    /// Produce a sampler for the named function.
    ///
    /// # Errors
    ///
    /// Returns an error when the sampler cannot be constructed, e.g. the
    /// function does not exist or its memory axis cannot be discovered.
    async fn sampler(&self, function_name: &str) -> Result<Box<dyn Sampler>>;
}
