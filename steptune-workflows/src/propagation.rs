//! ABOUTME: Payload propagator threading representative inputs through a live workflow
//! ABOUTME: Owns the only live function invocations and materializes Map iterations

use crate::builder::build_workflow;
use crate::index::FunctionIndex;
use crate::state::{Map, Parallel, State, Workflow};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;
use steptune_core::{FunctionInvoker, Result, StepTuneError};
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// Concurrency cap for branch and iteration worker pools
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Walks a workflow's states in order, chaining each state's output into the
/// next state's input and recording every Task's observed input.
///
/// Parallel branches and Map iterations run under a bounded worker pool;
/// results are reassembled in definition order (branches) or item order
/// (iterations). A failure in any worker aborts the enclosing propagation:
/// outstanding siblings are awaited, their results discarded, and the first
/// failure in definition order is surfaced tagged with the offending state.
pub struct Propagator {
    invoker: Arc<dyn FunctionInvoker>,
    index: FunctionIndex,
    max_concurrency: usize,
}

impl Propagator {
    pub fn new(invoker: Arc<dyn FunctionInvoker>, index: FunctionIndex) -> Self {
        Self {
            invoker,
            index,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Override the worker-pool cap (primarily for tests)
    #[must_use]
    pub const fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Propagate a payload through the workflow and return the overall
    /// output.
    ///
    /// # Errors
    ///
    /// Returns a propagation error tagged with the offending state when a
    /// live invocation fails, a branch or iteration worker fails, or a Map's
    /// items path does not resolve to exactly one JSON array.
    pub async fn propagate(&self, workflow: &mut Workflow, input: String) -> Result<String> {
        info!("Start propagating workflow inputs");
        let output = self.propagate_workflow(workflow, input).await?;
        info!("Finish propagating workflow inputs");
        Ok(output)
    }

    fn propagate_workflow<'a>(
        &'a self,
        workflow: &'a mut Workflow,
        input: String,
    ) -> BoxFuture<'a, Result<String>> {
        async move {
            let mut payload = input;
            for state in workflow.states_mut() {
                payload = self.propagate_state(state, payload).await?;
            }
            Ok(payload)
        }
        .boxed()
    }

    async fn propagate_state(&self, state: &mut State, input: String) -> Result<String> {
        match state {
            State::Task(task) => {
                let (state_name, function_name) = {
                    let mut task = task.write();
                    task.record_input(input.clone());
                    (task.name().to_string(), task.function_name().to_string())
                };
                debug!(state = %state_name, function = %function_name, "Invoking task");
                self.invoker
                    .invoke(&function_name, &input)
                    .await
                    .map_err(|e| StepTuneError::Propagation {
                        message: format!("invoking function '{function_name}' failed"),
                        state: Some(state_name),
                        source: Some(Box::new(e)),
                    })
            }
            State::Parallel(parallel) => self.propagate_parallel(parallel, &input).await,
            State::Map(map) => self.propagate_map(map, &input).await,
        }
    }

    /// Every branch receives the same input; outputs are reassembled in
    /// branch-list order as a JSON array.
    async fn propagate_parallel(&self, parallel: &mut Parallel, input: &str) -> Result<String> {
        let state_name = parallel.name.clone();
        debug!(
            state = %state_name,
            branches = parallel.branches.len(),
            "Executing parallel branches"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let futures = parallel.branches.iter_mut().map(|branch| {
            let semaphore = Arc::clone(&semaphore);
            let pool_state = state_name.clone();
            let input = input.to_string();
            async move {
                let _permit = semaphore.acquire_owned().await.map_err(|e| {
                    StepTuneError::propagation(format!("worker pool closed: {e}"), pool_state)
                })?;
                self.propagate_workflow(branch, input).await
            }
        });
        let results = join_all(futures).await;

        reassemble_outputs(results, &state_name)
    }

    /// Exactly one JSONPath match whose value is a JSON array is required;
    /// one fresh iteration workflow is built per item before the pooled runs.
    async fn propagate_map(&self, map: &mut Map, input: &str) -> Result<String> {
        let state_name = map.name.clone();
        let items = extract_items(input, &map.items_path, &state_name)?;
        debug!(
            state = %state_name,
            iterations = items.len(),
            "Expanding map iterations"
        );

        map.iterations = items
            .iter()
            .map(|_| build_workflow(&map.iterator, &self.index))
            .collect::<Result<Vec<_>>>()?;

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let futures = map
            .iterations
            .iter_mut()
            .zip(items)
            .map(|(iteration, item)| {
                let semaphore = Arc::clone(&semaphore);
                let pool_state = state_name.clone();
                async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        StepTuneError::propagation(format!("worker pool closed: {e}"), pool_state)
                    })?;
                    self.propagate_workflow(iteration, item).await
                }
            });
        let results = join_all(futures).await;

        reassemble_outputs(results, &state_name)
    }
}

/// Await-all semantics: every worker result is present; the first failure in
/// definition order wins, later results are discarded.
fn reassemble_outputs(results: Vec<Result<String>>, state_name: &str) -> Result<String> {
    let mut outputs = Vec::with_capacity(results.len());
    for result in results {
        let output = result?;
        let value: Value = serde_json::from_str(&output).map_err(|e| {
            StepTuneError::propagation(
                format!("worker output is not valid JSON: {e}"),
                state_name,
            )
        })?;
        outputs.push(value);
    }
    serde_json::to_string(&Value::Array(outputs)).map_err(|e| {
        StepTuneError::propagation(
            format!("worker outputs could not be serialized: {e}"),
            state_name,
        )
    })
}

fn extract_items(input: &str, items_path: &str, state_name: &str) -> Result<Vec<String>> {
    let document: Value = serde_json::from_str(input).map_err(|e| {
        StepTuneError::propagation(format!("map input is not valid JSON: {e}"), state_name)
    })?;
    let matches = jsonpath_lib::select(&document, items_path).map_err(|e| {
        StepTuneError::propagation(
            format!("items path '{items_path}' failed to evaluate: {e}"),
            state_name,
        )
    })?;

    let items = match matches.as_slice() {
        [Value::Array(items)] => items,
        [] => {
            return Err(StepTuneError::propagation(
                format!("items path '{items_path}' matched nothing"),
                state_name,
            ))
        }
        [_] => {
            return Err(StepTuneError::propagation(
                format!("items path '{items_path}' matched a value that is not an array"),
                state_name,
            ))
        }
        matched => {
            return Err(StepTuneError::propagation(
                format!(
                    "items path '{items_path}' matched {} values; exactly one array match is required",
                    matched.len()
                ),
                state_name,
            ))
        }
    };

    items
        .iter()
        .map(|item| {
            serde_json::to_string(item).map_err(|e| {
                StepTuneError::propagation(
                    format!("map item could not be serialized: {e}"),
                    state_name,
                )
            })
        })
        .collect()
}
