//! ABOUTME: Mock Sampler and FunctionInvoker implementations for tests
//! ABOUTME: Tracks operations for verification and supports configured failures

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use steptune_core::{
    FunctionInvoker, ParamCurve, PayloadFit, Result, Sampler, SamplerProvider, StepTuneError,
    WeightedPayload,
};

type InvocationHandler = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Mock sampler for one function.
///
/// Fitted curves follow `duration_ms(m) = k / m`. The weighted cost vector
/// folded into the accumulator is `weight * k / m` per axis entry by default
/// (cost falls as memory rises, so the largest memory wins the argmin), or a
/// configured explicit profile for tests that need ties or rising costs.
pub struct MockSampler {
    function_name: String,
    memory_space: Vec<u32>,
    curve_k: f64,
    cost_profile: Option<Vec<f64>>,
    fits: Arc<RwLock<Vec<(String, WeightedPayload)>>>,
}

impl MockSampler {
    #[must_use]
    pub fn new(function_name: impl Into<String>, memory_space: Vec<u32>, curve_k: f64) -> Self {
        Self {
            function_name: function_name.into(),
            memory_space,
            curve_k,
            cost_profile: None,
            fits: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Replace the default decreasing cost vector with an explicit per-axis
    /// profile
    #[must_use]
    pub fn with_cost_profile(mut self, profile: Vec<f64>) -> Self {
        self.cost_profile = Some(profile);
        self
    }

    fn cost_at(&self, axis_index: usize) -> f64 {
        self.cost_profile.as_ref().map_or_else(
            || self.curve_k / f64::from(self.memory_space[axis_index]),
            |profile| profile[axis_index],
        )
    }
}

#[async_trait]
impl Sampler for MockSampler {
    fn memory_space(&self) -> &[u32] {
        &self.memory_space
    }

    async fn fit_payload(
        &self,
        payload: &WeightedPayload,
        collective_costs: &mut [f64],
    ) -> Result<PayloadFit> {
        self.fits
            .write()
            .push((self.function_name.clone(), payload.clone()));

        let mut min_index = 0;
        for index in 0..self.memory_space.len() {
            let weighted = payload.weight * self.cost_at(index);
            collective_costs[index] += weighted;
            if self.cost_at(index) < self.cost_at(min_index) {
                min_index = index;
            }
        }

        let k = self.curve_k;
        Ok(PayloadFit {
            min_memory_mb: self.memory_space[min_index],
            curve: ParamCurve::new(move |m| k / f64::from(m)),
        })
    }
}

/// Mock sampler factory shared across a test.
///
/// Produces a [`MockSampler`] per function, with per-function curve constants
/// and cost profiles, configured failures, and tracking of which functions
/// were requested and which payloads were fitted.
#[derive(Clone)]
pub struct MockSamplerProvider {
    memory_space: Vec<u32>,
    default_k: f64,
    curves: Arc<RwLock<HashMap<String, f64>>>,
    profiles: Arc<RwLock<HashMap<String, Vec<f64>>>>,
    failures: Arc<RwLock<HashSet<String>>>,
    requested: Arc<RwLock<Vec<String>>>,
    fits: Arc<RwLock<Vec<(String, WeightedPayload)>>>,
}

impl MockSamplerProvider {
    #[must_use]
    pub fn new(memory_space: Vec<u32>) -> Self {
        Self {
            memory_space,
            default_k: 1000.0,
            curves: Arc::new(RwLock::new(HashMap::new())),
            profiles: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(RwLock::new(HashSet::new())),
            requested: Arc::new(RwLock::new(Vec::new())),
            fits: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the default `k` used for functions without an explicit curve
    #[must_use]
    pub const fn with_default_curve(mut self, k: f64) -> Self {
        self.default_k = k;
        self
    }

    /// Fitted curves for `function` follow `duration_ms(m) = k / m`
    #[must_use]
    pub fn with_curve(self, function: impl Into<String>, k: f64) -> Self {
        self.curves.write().insert(function.into(), k);
        self
    }

    /// Explicit per-axis cost vector for `function` (still weighted per
    /// payload)
    #[must_use]
    pub fn with_cost_profile(self, function: impl Into<String>, profile: Vec<f64>) -> Self {
        self.profiles.write().insert(function.into(), profile);
        self
    }

    /// Sampler construction for `function` fails
    #[must_use]
    pub fn fail_for(self, function: impl Into<String>) -> Self {
        self.failures.write().insert(function.into());
        self
    }

    /// Functions samplers were requested for, in request order
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested.read().clone()
    }

    /// All `(function, payload)` fits recorded across samplers
    #[must_use]
    pub fn fits(&self) -> Vec<(String, WeightedPayload)> {
        self.fits.read().clone()
    }
}

#[async_trait]
impl SamplerProvider for MockSamplerProvider {
    async fn sampler(&self, function_name: &str) -> Result<Box<dyn Sampler>> {
        self.requested.write().push(function_name.to_string());

        if self.failures.read().contains(function_name) {
            return Err(StepTuneError::Optimization {
                message: "mock sampler failure".to_string(),
                function: Some(function_name.to_string()),
                source: None,
            });
        }

        let k = self
            .curves
            .read()
            .get(function_name)
            .copied()
            .unwrap_or(self.default_k);
        let mut sampler = MockSampler::new(function_name, self.memory_space.clone(), k);
        if let Some(profile) = self.profiles.read().get(function_name).cloned() {
            sampler = sampler.with_cost_profile(profile);
        }
        // share the provider-level fit log so tests can verify weighting
        sampler.fits = Arc::clone(&self.fits);
        Ok(Box::new(sampler))
    }
}

/// Mock serverless invocation client.
///
/// Echoes the payload back by default; per-function canned responses,
/// handlers, and failures can be configured. Every invocation is recorded
/// for verification.
#[derive(Clone, Default)]
pub struct MockInvoker {
    handlers: Arc<RwLock<HashMap<String, InvocationHandler>>>,
    failures: Arc<RwLock<HashSet<String>>>,
    invocations: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed response body for one function
    #[must_use]
    pub fn with_response(self, function: impl Into<String>, response: impl Into<String>) -> Self {
        let response = response.into();
        self.handlers
            .write()
            .insert(function.into(), Arc::new(move |_| response.clone()));
        self
    }

    /// Computed response for one function
    #[must_use]
    pub fn with_handler(
        self,
        function: impl Into<String>,
        handler: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.handlers
            .write()
            .insert(function.into(), Arc::new(handler));
        self
    }

    /// Invocations of one function fail
    #[must_use]
    pub fn fail_on(self, function: impl Into<String>) -> Self {
        self.failures.write().insert(function.into());
        self
    }

    /// All `(function, payload)` invocations in call order
    #[must_use]
    pub fn invocations(&self) -> Vec<(String, String)> {
        self.invocations.read().clone()
    }

    /// Number of invocations recorded for one function
    #[must_use]
    pub fn invocation_count(&self, function: &str) -> usize {
        self.invocations
            .read()
            .iter()
            .filter(|(name, _)| name == function)
            .count()
    }
}

#[async_trait]
impl FunctionInvoker for MockInvoker {
    async fn invoke(&self, function_name: &str, payload: &str) -> Result<String> {
        self.invocations
            .write()
            .push((function_name.to_string(), payload.to_string()));

        if self.failures.read().contains(function_name) {
            return Err(StepTuneError::Invocation {
                message: "mock invocation failure".to_string(),
                function: function_name.to_string(),
                source: None,
            });
        }

        let handler = self.handlers.read().get(function_name).cloned();
        Ok(handler.map_or_else(|| payload.to_string(), |h| h(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invoker_echoes_by_default() {
        let invoker = MockInvoker::new();
        let output = invoker.invoke("f", "{\"x\":1}").await.unwrap();
        assert_eq!(output, "{\"x\":1}");
        assert_eq!(invoker.invocation_count("f"), 1);
    }

    #[tokio::test]
    async fn test_invoker_canned_response_and_failure() {
        let invoker = MockInvoker::new()
            .with_response("good", "\"done\"")
            .fail_on("bad");

        assert_eq!(invoker.invoke("good", "{}").await.unwrap(), "\"done\"");
        assert!(invoker.invoke("bad", "{}").await.is_err());
        assert_eq!(invoker.invocations().len(), 2);
    }

    #[tokio::test]
    async fn test_sampler_accumulates_weighted_costs() {
        let provider = MockSamplerProvider::new(vec![128, 256]).with_curve("f", 2000.0);
        let sampler = provider.sampler("f").await.unwrap();

        let mut collective = vec![0.0, 0.0];
        let fit = sampler
            .fit_payload(&WeightedPayload::new("{}", 0.5), &mut collective)
            .await
            .unwrap();

        // weight * k / m at each axis point
        assert!((collective[0] - 0.5 * 2000.0 / 128.0).abs() < 1e-9);
        assert!((collective[1] - 0.5 * 2000.0 / 256.0).abs() < 1e-9);
        // cost falls with memory, so the largest memory is the minimum
        assert_eq!(fit.min_memory_mb, 256);
        assert!((fit.curve.duration_ms(256) - 7.8125).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sampler_explicit_profile_and_failure() {
        let provider = MockSamplerProvider::new(vec![128, 256, 512])
            .with_cost_profile("flat", vec![5.0, 5.0, 5.0])
            .fail_for("broken");

        let sampler = provider.sampler("flat").await.unwrap();
        let mut collective = vec![0.0; 3];
        let fit = sampler
            .fit_payload(&WeightedPayload::new("{}", 1.0), &mut collective)
            .await
            .unwrap();
        // flat profile ties resolve to the smallest memory
        assert_eq!(fit.min_memory_mb, 128);

        assert!(provider.sampler("broken").await.is_err());
        assert_eq!(provider.requested(), vec!["flat", "broken"]);
    }
}
