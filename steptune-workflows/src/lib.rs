//! ABOUTME: Workflow model, payload propagation, and critical-path engine for steptune
//! ABOUTME: Translates Task/Parallel/Map definitions into an evaluable performance/cost graph

pub mod builder;
pub mod critical_path;
pub mod index;
pub mod propagation;
pub mod state;

pub use builder::build_workflow;
pub use critical_path::critical_path;
pub use index::FunctionIndex;
pub use propagation::{Propagator, DEFAULT_MAX_CONCURRENCY};
pub use state::{Map, Parallel, State, Task, TaskRef, Workflow};
