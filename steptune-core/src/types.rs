//! ABOUTME: Shared value types for steptune
//! ABOUTME: Provides ParamCurve (memoized memory->duration mapping) and sampler payload types

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A fitted performance curve mapping memory size (MB) to expected duration (ms).
///
/// The curve is produced by a [`Sampler`](crate::traits::sampler::Sampler) and
/// treated as an opaque pure function. Evaluations are memoized because the
/// escalator calls the curve repeatedly for the same handful of memory sizes.
///
/// # Examples
///
/// ```
/// use steptune_core::ParamCurve;
///
/// let curve = ParamCurve::new(|memory_mb| 2000.0 / f64::from(memory_mb));
/// assert!((curve.duration_ms(256) - 7.8125).abs() < 1e-9);
/// ```
#[derive(Clone)]
pub struct ParamCurve {
    f: Arc<dyn Fn(u32) -> f64 + Send + Sync>,
    cache: Arc<RwLock<HashMap<u32, f64>>>,
}

impl ParamCurve {
    /// Wrap a fitted `memory -> duration_ms` function
    pub fn new(f: impl Fn(u32) -> f64 + Send + Sync + 'static) -> Self {
        Self {
            f: Arc::new(f),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Expected duration in milliseconds at the given memory size
    #[must_use]
    pub fn duration_ms(&self, memory_mb: u32) -> f64 {
        if let Some(cached) = self.cache.read().get(&memory_mb) {
            return *cached;
        }
        let value = (self.f)(memory_mb);
        self.cache.write().insert(memory_mb, value);
        value
    }

    /// Expected cost in MB-milliseconds at the given memory size.
    ///
    /// Proportional to serverless pricing; the scalar units cancel when
    /// ratios are compared.
    #[must_use]
    pub fn cost_mb_ms(&self, memory_mb: u32) -> f64 {
        self.duration_ms(memory_mb) * f64::from(memory_mb)
    }
}

impl fmt::Debug for ParamCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamCurve")
            .field("cached_points", &self.cache.read().len())
            .finish()
    }
}

/// A representative payload with the weight it contributes to a function's
/// collective cost accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPayload {
    pub payload: String,
    pub weight: f64,
}

impl WeightedPayload {
    pub fn new(payload: impl Into<String>, weight: f64) -> Self {
        Self {
            payload: payload.into(),
            weight,
        }
    }
}

/// Result of fitting one payload: that payload's cost-minimal memory size and
/// the fitted curve.
#[derive(Debug, Clone)]
pub struct PayloadFit {
    pub min_memory_mb: u32,
    pub curve: ParamCurve,
}
