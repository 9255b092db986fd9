//! ABOUTME: Critical-path engine computing the longest-time path through a workflow
//! ABOUTME: Pure with respect to current memory sizes; called after every memory mutation

use crate::state::{State, TaskRef, Workflow};
use std::sync::Arc;

/// Compute the ordered list of tasks on the longest-time path and the total
/// time in milliseconds.
///
/// A workflow contributes its states in order (time is the sum); a Parallel
/// or Map contributes only its longest branch or iteration (time is the max,
/// and equal times keep the first in list order).
#[must_use]
pub fn critical_path(workflow: &Workflow) -> (Vec<TaskRef>, f64) {
    let mut tasks = Vec::new();
    let time = workflow_time(workflow, &mut tasks);
    (tasks, time)
}

fn workflow_time(workflow: &Workflow, tasks: &mut Vec<TaskRef>) -> f64 {
    workflow
        .states()
        .iter()
        .map(|state| state_time(state, tasks))
        .sum()
}

fn state_time(state: &State, tasks: &mut Vec<TaskRef>) -> f64 {
    match state {
        State::Task(task) => {
            tasks.push(Arc::clone(task));
            task.read().execution_time()
        }
        State::Parallel(parallel) => longest_child(&parallel.branches, tasks),
        State::Map(map) => longest_child(&map.iterations, tasks),
    }
}

/// Max over children by time; strict `>` keeps the first child on ties. An
/// empty child list contributes no tasks and zero time.
fn longest_child(children: &[Workflow], tasks: &mut Vec<TaskRef>) -> f64 {
    let mut best: Option<(Vec<TaskRef>, f64)> = None;
    for child in children {
        let mut child_tasks = Vec::new();
        let child_time = workflow_time(child, &mut child_tasks);
        let replace = best.as_ref().map_or(true, |(_, time)| child_time > *time);
        if replace {
            best = Some((child_tasks, child_time));
        }
    }
    match best {
        Some((child_tasks, time)) => {
            tasks.extend(child_tasks);
            time
        }
        None => 0.0,
    }
}
