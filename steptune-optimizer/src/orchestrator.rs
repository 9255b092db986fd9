//! ABOUTME: Orchestrator driving build, propagation, optimization, and escalation per payload
//! ABOUTME: Owns the function-to-tasks index lifecycle and the per-payload reports

use crate::escalation::{escalate, EscalationOutcome};
use crate::functions::FunctionOptimizer;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use steptune_config::{AggregationPolicy, FailurePolicy, SteptuneConfig};
use steptune_core::{FunctionInvoker, Result, SamplerProvider, StepTuneError};
use steptune_workflows::{build_workflow, critical_path, FunctionIndex, Propagator};
use tracing::{info, warn};

/// Final assignment for one payload: per-function memory sizes in first-seen
/// order, the achieved critical-path time, the workflow cost, and whether the
/// execution-time constraint was met.
#[derive(Debug, Clone, Serialize)]
pub struct PayloadReport {
    pub payload: String,
    pub function_memory: Vec<FunctionMemory>,
    pub critical_path_ms: f64,
    pub cost_mb_ms: f64,
    pub constraint_met: bool,
}

/// One function's final memory size in MB
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FunctionMemory {
    pub function: String,
    pub memory_mb: u32,
}

/// Combined view across payloads under the max-memory-per-function policy
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub function_memory: Vec<FunctionMemory>,
}

/// Drives the optimization pipeline for each representative payload: a fresh
/// FunctionIndex, a fresh workflow build, live propagation (which
/// materializes Map iterations), per-function cost optimization, and
/// constrained escalation.
pub struct Orchestrator {
    config: SteptuneConfig,
    definition: Value,
    invoker: Arc<dyn FunctionInvoker>,
    samplers: Arc<dyn SamplerProvider>,
}

impl Orchestrator {
    pub fn new(
        config: SteptuneConfig,
        definition: Value,
        invoker: Arc<dyn FunctionInvoker>,
        samplers: Arc<dyn SamplerProvider>,
    ) -> Self {
        Self {
            config,
            definition,
            invoker,
            samplers,
        }
    }

    /// Optimize every configured payload and return one report per payload
    /// that completed.
    ///
    /// # Errors
    ///
    /// Under the default abort policy, the first payload failure aborts the
    /// run; under the skip policy, failed payloads are logged and dropped.
    /// An infeasible time constraint is not a failure: the report carries
    /// `constraint_met = false` with the memory sizes reached.
    pub async fn optimize(&self) -> Result<Vec<PayloadReport>> {
        let mut reports = Vec::with_capacity(self.config.payloads.len());
        for entry in &self.config.payloads {
            match self.optimize_payload(&entry.payload).await {
                Ok(report) => reports.push(report),
                Err(e) => match self.config.on_payload_failure {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Skip => {
                        warn!(error = %e, "Skipping failed payload");
                    }
                },
            }
        }
        Ok(reports)
    }

    async fn optimize_payload(&self, payload: &str) -> Result<PayloadReport> {
        info!(arn = %self.config.arn, "Start optimizing payload");

        let index = FunctionIndex::new();
        let mut workflow = build_workflow(&self.definition, &index)?;

        let propagator = Propagator::new(Arc::clone(&self.invoker), index.clone());
        propagator
            .propagate(&mut workflow, payload.to_string())
            .await?;

        FunctionOptimizer::new(Arc::clone(&self.samplers))
            .optimize_all(&index)
            .await?;

        let outcome = match escalate(
            &workflow,
            &index,
            self.config.memory_size_increment,
            self.config.constraint_execution_time_threshold,
        ) {
            Ok(outcome) => outcome,
            Err(StepTuneError::Infeasible {
                message,
                threshold_ms,
            }) => {
                warn!(threshold_ms, message = %message, "Execution time constraint is infeasible");
                let (_, time) = critical_path(&workflow);
                EscalationOutcome {
                    critical_path_ms: time,
                    cost_mb_ms: workflow.cost(),
                    constraint_met: false,
                }
            }
            Err(e) => return Err(e),
        };

        let function_memory = index
            .snapshot()
            .into_iter()
            .map(|(function, tasks)| FunctionMemory {
                function,
                memory_mb: tasks.first().map_or(0, |task| task.read().memory_size()),
            })
            .collect();

        info!(
            time_ms = outcome.critical_path_ms,
            cost_mb_ms = outcome.cost_mb_ms,
            constraint_met = outcome.constraint_met,
            "Finish optimizing payload"
        );
        Ok(PayloadReport {
            payload: payload.to_string(),
            function_memory,
            critical_path_ms: outcome.critical_path_ms,
            cost_mb_ms: outcome.cost_mb_ms,
            constraint_met: outcome.constraint_met,
        })
    }

    /// Combine per-payload reports according to the configured aggregation
    /// policy. The default independent policy returns `None`; the
    /// max-memory-per-function policy takes each function's maximum across
    /// payloads, in first-report order.
    #[must_use]
    pub fn aggregate(&self, reports: &[PayloadReport]) -> Option<AggregateReport> {
        match self.config.aggregation {
            AggregationPolicy::Independent => None,
            AggregationPolicy::MaxMemoryPerFunction => {
                let mut order: Vec<String> = Vec::new();
                let mut maxima: HashMap<String, u32> = HashMap::new();
                for report in reports {
                    for entry in &report.function_memory {
                        let current = maxima.entry(entry.function.clone()).or_insert(0);
                        *current = (*current).max(entry.memory_mb);
                        if !order.contains(&entry.function) {
                            order.push(entry.function.clone());
                        }
                    }
                }
                Some(AggregateReport {
                    function_memory: order
                        .into_iter()
                        .map(|function| {
                            let memory_mb = maxima.get(&function).copied().unwrap_or(0);
                            FunctionMemory {
                                function,
                                memory_mb,
                            }
                        })
                        .collect(),
                })
            }
        }
    }
}
