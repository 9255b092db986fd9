//! ABOUTME: Two-phase memory optimizer for steptune workflows
//! ABOUTME: Per-function cost minimization, constrained escalation, and the driving orchestrator

pub mod escalation;
pub mod functions;
pub mod orchestrator;

pub use escalation::{escalate, EscalationOutcome};
pub use functions::FunctionOptimizer;
pub use orchestrator::{AggregateReport, Orchestrator, PayloadReport};
