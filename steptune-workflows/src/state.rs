//! ABOUTME: State and Workflow sum-type model with per-node time/cost evaluation
//! ABOUTME: Tasks are shared between the workflow tree and the FunctionIndex via TaskRef

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use steptune_core::ParamCurve;

/// Shared handle to a Task: one allocation referenced by both the workflow
/// tree and the [`FunctionIndex`](crate::FunctionIndex).
pub type TaskRef = Arc<RwLock<Task>>;

/// An invocation of a single named serverless function with a specific input.
///
/// All memory fields are 0 until per-function optimization assigns them; the
/// fitted curve is absent until then as well, and a task without a curve has
/// execution time 0 and cost 0.
#[derive(Debug)]
pub struct Task {
    name: String,
    function_name: String,
    input: Option<String>,
    curve: Option<ParamCurve>,
    memory_size: u32,
    initial_memory_size: u32,
    max_memory_size: u32,
}

impl Task {
    pub fn new(name: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            function_name: function_name.into(),
            input: None,
            curve: None,
            memory_size: 0,
            initial_memory_size: 0,
            max_memory_size: 0,
        }
    }

    /// Wrap into the shared handle used by the tree and the index
    #[must_use]
    pub fn shared(self) -> TaskRef {
        Arc::new(RwLock::new(self))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// The payload observed for this task during propagation
    #[must_use]
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Record the observed input; set once by the propagator
    pub fn record_input(&mut self, input: String) {
        self.input = Some(input);
    }

    #[must_use]
    pub fn curve(&self) -> Option<&ParamCurve> {
        self.curve.as_ref()
    }

    /// Store the fitted performance curve; set once by per-function
    /// optimization
    pub fn set_curve(&mut self, curve: ParamCurve) {
        self.curve = Some(curve);
    }

    #[must_use]
    pub const fn memory_size(&self) -> u32 {
        self.memory_size
    }

    #[must_use]
    pub const fn initial_memory_size(&self) -> u32 {
        self.initial_memory_size
    }

    #[must_use]
    pub const fn max_memory_size(&self) -> u32 {
        self.max_memory_size
    }

    /// Assign the cost-optimal starting memory and the axis cap; set once by
    /// per-function optimization
    pub fn assign_memory(&mut self, initial_mb: u32, max_mb: u32) {
        self.memory_size = initial_mb;
        self.initial_memory_size = initial_mb;
        self.max_memory_size = max_mb;
    }

    /// Bump the current memory size; the escalator only ever moves upward
    pub fn increase_memory(&mut self, increment_mb: u32) {
        self.memory_size += increment_mb;
    }

    /// Restore the current memory size to the cost-optimal assignment
    pub fn reset_memory(&mut self) {
        self.memory_size = self.initial_memory_size;
    }

    /// Expected duration in ms at the current memory size
    #[must_use]
    pub fn execution_time(&self) -> f64 {
        self.execution_time_at(self.memory_size)
    }

    /// Expected duration in ms at a hypothetical memory size
    #[must_use]
    pub fn execution_time_at(&self, memory_mb: u32) -> f64 {
        self.curve.as_ref().map_or(0.0, |c| c.duration_ms(memory_mb))
    }

    /// Expected cost in MB-ms at the current memory size
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.cost_at(self.memory_size)
    }

    /// Expected cost in MB-ms at a hypothetical memory size
    #[must_use]
    pub fn cost_at(&self, memory_mb: u32) -> f64 {
        self.execution_time_at(memory_mb) * f64::from(memory_mb)
    }
}

/// Parallel state: a fixed set of branch workflows executed concurrently on
/// the same input. Time is the longest branch; cost is the sum of branches.
#[derive(Debug, Default)]
pub struct Parallel {
    pub name: String,
    pub branches: Vec<Workflow>,
}

impl Parallel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
        }
    }

    pub fn add_branch(&mut self, branch: Workflow) {
        self.branches.push(branch);
    }

    #[must_use]
    pub fn execution_time(&self) -> f64 {
        self.branches
            .iter()
            .map(Workflow::execution_time)
            .fold(0.0, f64::max)
    }

    #[must_use]
    pub fn cost(&self) -> f64 {
        self.branches.iter().map(Workflow::cost).sum()
    }
}

/// Map state: a dynamically-sized set of iteration workflows, one per item
/// resolved from the input via JSONPath. Iterations are materialized by the
/// propagator once the runtime item count is known; the stored iterator
/// definition stays unexpanded until then.
#[derive(Debug)]
pub struct Map {
    pub name: String,
    pub iterator: Value,
    pub items_path: String,
    pub iterations: Vec<Workflow>,
}

impl Map {
    pub fn new(name: impl Into<String>, iterator: Value, items_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            iterator,
            items_path: items_path.into(),
            iterations: Vec::new(),
        }
    }

    #[must_use]
    pub fn execution_time(&self) -> f64 {
        self.iterations
            .iter()
            .map(Workflow::execution_time)
            .fold(0.0, f64::max)
    }

    #[must_use]
    pub fn cost(&self) -> f64 {
        self.iterations.iter().map(Workflow::cost).sum()
    }
}

/// One state of a workflow
#[derive(Debug)]
pub enum State {
    Task(TaskRef),
    Parallel(Parallel),
    Map(Map),
}

impl State {
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Task(task) => task.read().name().to_string(),
            Self::Parallel(parallel) => parallel.name.clone(),
            Self::Map(map) => map.name.clone(),
        }
    }

    #[must_use]
    pub fn execution_time(&self) -> f64 {
        match self {
            Self::Task(task) => task.read().execution_time(),
            Self::Parallel(parallel) => parallel.execution_time(),
            Self::Map(map) => map.execution_time(),
        }
    }

    #[must_use]
    pub fn cost(&self) -> f64 {
        match self {
            Self::Task(task) => task.read().cost(),
            Self::Parallel(parallel) => parallel.cost(),
            Self::Map(map) => map.cost(),
        }
    }
}

/// An ordered sequence of states executed in series.
///
/// Time is the sum of state times; cost is the sum of state costs. A workflow
/// is created before propagation, grown by Map expansion during propagation,
/// and never shrinks.
#[derive(Debug, Default)]
pub struct Workflow {
    states: Vec<State>,
}

impl Workflow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, state: State) {
        self.states.push(state);
    }

    #[must_use]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub(crate) fn states_mut(&mut self) -> &mut [State] {
        &mut self.states
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn execution_time(&self) -> f64 {
        self.states.iter().map(State::execution_time).sum()
    }

    #[must_use]
    pub fn cost(&self) -> f64 {
        self.states.iter().map(State::cost).sum()
    }
}
