//! ABOUTME: Greedy marginal-ratio memory escalation honoring the execution-time constraint
//! ABOUTME: Raises the function buying the most critical-path time per unit of extra cost

use std::collections::HashMap;
use steptune_core::{Result, StepTuneError};
use steptune_workflows::{critical_path, FunctionIndex, TaskRef, Workflow};
use tracing::{debug, info, warn};

/// Achieved state after escalation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EscalationOutcome {
    pub critical_path_ms: f64,
    pub cost_mb_ms: f64,
    pub constraint_met: bool,
}

/// Raise memory sizes until the critical-path time falls below the threshold.
///
/// Starting from the cost-optimal assignment, each loop iteration recomputes
/// the critical path, accumulates per-function time reductions for one more
/// increment (tasks at their cap contribute nothing), and bumps every task of
/// the function with the lowest `cost_increase / time_reduction` ratio.
/// First-seen order along the path breaks ties. An unset threshold makes
/// this a no-op.
///
/// # Errors
///
/// Returns [`StepTuneError::Infeasible`] when the threshold cannot be met
/// because no critical-path task can be raised further; memory bumped by
/// earlier iterations is kept.
pub fn escalate(
    workflow: &Workflow,
    index: &FunctionIndex,
    increment_mb: u32,
    threshold_ms: Option<f64>,
) -> Result<EscalationOutcome> {
    let Some(threshold) = threshold_ms else {
        warn!("No execution time threshold configured; skipping escalation");
        let (_, time) = critical_path(workflow);
        return Ok(EscalationOutcome {
            critical_path_ms: time,
            cost_mb_ms: workflow.cost(),
            constraint_met: true,
        });
    };

    // total cost delta per function for one more increment; can be negative
    // because higher memory often shortens time by more than proportion
    let mut cost_increases: HashMap<String, f64> = index
        .snapshot()
        .into_iter()
        .map(|(function, tasks)| (function, cost_increase(&tasks, increment_mb)))
        .collect();

    let (mut path, mut time) = critical_path(workflow);
    info!(
        time_ms = time,
        threshold_ms = threshold,
        cost_mb_ms = workflow.cost(),
        "Start escalating memory for the execution time constraint"
    );

    while time > threshold {
        // per-function time reduction over critical-path tasks, first-seen order
        let mut reductions: Vec<(String, f64)> = Vec::new();
        for task in &path {
            let task = task.read();
            if task.memory_size() + increment_mb > task.max_memory_size() {
                continue;
            }
            let reduction =
                task.execution_time() - task.execution_time_at(task.memory_size() + increment_mb);
            match reductions
                .iter_mut()
                .find(|(function, _)| function == task.function_name())
            {
                Some((_, total)) => *total += reduction,
                None => reductions.push((task.function_name().to_string(), reduction)),
            }
        }

        let mut best: Option<(&str, f64)> = None;
        for (function, reduction) in &reductions {
            if *reduction <= 0.0 {
                continue;
            }
            let ratio = cost_increases.get(function).copied().unwrap_or(0.0) / reduction;
            debug!(function = %function, ratio, reduction = *reduction, "Escalation candidate");
            if best.map_or(true, |(_, lowest)| ratio < lowest) {
                best = Some((function.as_str(), ratio));
            }
        }

        let Some((chosen, _)) = best else {
            return Err(StepTuneError::Infeasible {
                message: "every critical-path task is at its memory cap".to_string(),
                threshold_ms: threshold,
            });
        };
        let chosen = chosen.to_string();

        // bump every task of the chosen function, not just those on the path
        let tasks = index.tasks(&chosen);
        for task in &tasks {
            task.write().increase_memory(increment_mb);
        }
        cost_increases.insert(chosen.clone(), cost_increase(&tasks, increment_mb));

        let (new_path, new_time) = critical_path(workflow);
        path = new_path;
        time = new_time;
        debug!(
            function = %chosen,
            time_ms = time,
            cost_mb_ms = workflow.cost(),
            "Escalated function memory"
        );
    }

    info!(
        time_ms = time,
        threshold_ms = threshold,
        cost_mb_ms = workflow.cost(),
        "Finish escalating memory for the execution time constraint"
    );
    Ok(EscalationOutcome {
        critical_path_ms: time,
        cost_mb_ms: workflow.cost(),
        constraint_met: true,
    })
}

fn cost_increase(tasks: &[TaskRef], increment_mb: u32) -> f64 {
    tasks
        .iter()
        .map(|task| {
            let task = task.read();
            task.cost_at(task.memory_size() + increment_mb) - task.cost()
        })
        .sum()
}
