//! ABOUTME: Per-function cost minimization across representative inputs
//! ABOUTME: Fits one curve per task and assigns the collective cost-minimal memory size

use futures::future::join_all;
use std::sync::Arc;
use steptune_core::{Result, SamplerProvider, StepTuneError, WeightedPayload};
use steptune_workflows::{FunctionIndex, TaskRef, DEFAULT_MAX_CONCURRENCY};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Optimizes each distinct function for cost, independently and in parallel.
///
/// For one function: every task's observed input is fitted with equal weight
/// `1/k` through the sampler, accumulating a collective cost vector over the
/// function's discrete memory axis; the axis entry minimizing collective cost
/// (smallest index on ties) becomes every task's starting memory, and the
/// axis maximum becomes the cap.
pub struct FunctionOptimizer {
    provider: Arc<dyn SamplerProvider>,
    max_concurrency: usize,
}

impl FunctionOptimizer {
    pub fn new(provider: Arc<dyn SamplerProvider>) -> Self {
        Self {
            provider,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Override the worker-pool cap (primarily for tests)
    #[must_use]
    pub const fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Optimize every function in the index.
    ///
    /// All functions are processed even when one fails; the first failure in
    /// first-seen function order is then surfaced.
    ///
    /// # Errors
    ///
    /// Returns an optimization error when a sampler cannot be constructed,
    /// produces an empty memory axis, or fails to fit a payload.
    pub async fn optimize_all(&self, index: &FunctionIndex) -> Result<()> {
        info!(functions = index.len(), "Start optimizing all functions");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let futures = index.snapshot().into_iter().map(|(function, tasks)| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    StepTuneError::Optimization {
                        message: format!("worker pool closed: {e}"),
                        function: Some(function.clone()),
                        source: None,
                    }
                })?;
                self.optimize_function(&function, &tasks).await
            }
        });
        let results = join_all(futures).await;
        for result in results {
            result?;
        }

        info!("Finish optimizing all functions");
        Ok(())
    }

    async fn optimize_function(&self, function: &str, tasks: &[TaskRef]) -> Result<()> {
        let sampler = self.provider.sampler(function).await?;
        let memory_space = sampler.memory_space().to_vec();
        let Some(&max_memory) = memory_space.last() else {
            return Err(StepTuneError::Optimization {
                message: "sampler produced an empty memory axis".to_string(),
                function: Some(function.to_string()),
                source: None,
            });
        };

        let mut collective_costs = vec![0.0; memory_space.len()];
        #[allow(clippy::cast_precision_loss)]
        let weight = 1.0 / tasks.len() as f64;

        for task in tasks {
            let (task_name, input) = {
                let task = task.read();
                let input = task
                    .input()
                    .ok_or_else(|| StepTuneError::Optimization {
                        message: format!(
                            "task '{}' has no recorded input; propagation must run first",
                            task.name()
                        ),
                        function: Some(function.to_string()),
                        source: None,
                    })?
                    .to_string();
                (task.name().to_string(), input)
            };

            let payload = WeightedPayload::new(input, weight);
            let fit = sampler.fit_payload(&payload, &mut collective_costs).await?;
            debug!(
                function,
                task = %task_name,
                min_memory_mb = fit.min_memory_mb,
                "Fitted payload curve"
            );
            task.write().set_curve(fit.curve);
        }

        // argmin over the collective cost vector; ties keep the smallest memory
        let mut min_index = 0;
        for (index, cost) in collective_costs.iter().enumerate() {
            if *cost < collective_costs[min_index] {
                min_index = index;
            }
        }
        let min_memory = memory_space[min_index];

        for task in tasks {
            task.write().assign_memory(min_memory, max_memory);
        }
        info!(function, memory_mb = min_memory, "Selected cost-minimal memory size");
        Ok(())
    }
}
