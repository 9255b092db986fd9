//! ABOUTME: Builds the in-memory Workflow model from a JSON workflow definition
//! ABOUTME: Follows the StartAt/Next chain and registers Task nodes in the FunctionIndex

use crate::index::FunctionIndex;
use crate::state::{Map, Parallel, State, Task, Workflow};
use serde_json::{json, Map as JsonMap, Value};
use std::collections::HashSet;
use steptune_core::{Result, StepTuneError};

/// Build a Workflow from a definition object, registering every Task in the
/// index.
///
/// The definition must carry `StartAt` (name of the first state) and `States`
/// (name to state-object mapping). The chain follows `Next` and terminates on
/// `End: true` or on a state with neither key. Map iterators are stored
/// unexpanded; the propagator materializes iterations once it observes the
/// runtime item count.
///
/// # Errors
///
/// Returns a definition error for a missing `StartAt`/`States`, a dangling
/// state reference, a `Next` chain that revisits a state, an unsupported
/// state type, or a state object missing its type-specific fields.
pub fn build_workflow(definition: &Value, index: &FunctionIndex) -> Result<Workflow> {
    let start_at = definition
        .get("StartAt")
        .and_then(Value::as_str)
        .ok_or_else(|| StepTuneError::Definition {
            message: "definition is missing a 'StartAt' state name".to_string(),
            state: None,
        })?;
    let states = definition
        .get("States")
        .and_then(Value::as_object)
        .ok_or_else(|| StepTuneError::Definition {
            message: "definition is missing a 'States' mapping".to_string(),
            state: None,
        })?;

    let mut workflow = Workflow::new();
    let mut visited = HashSet::new();
    let mut current = start_at;

    loop {
        if !visited.insert(current.to_string()) {
            return Err(StepTuneError::definition(
                "state chain revisits a state; workflows must be acyclic",
                current,
            ));
        }
        let state_def = states.get(current).ok_or_else(|| {
            StepTuneError::definition("chain references a state not present in 'States'", current)
        })?;

        workflow.add_state(build_state(current, state_def, index)?);

        match state_def.get("Next").and_then(Value::as_str) {
            Some(next) => current = next,
            None => break,
        }
    }

    Ok(workflow)
}

fn build_state(name: &str, state_def: &Value, index: &FunctionIndex) -> Result<State> {
    let state_type = state_def
        .get("Type")
        .and_then(Value::as_str)
        .ok_or_else(|| StepTuneError::definition("state object is missing 'Type'", name))?;

    match state_type {
        "Task" => {
            let function_name = state_def
                .pointer("/Parameters/FunctionName")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    StepTuneError::definition(
                        "Task state is missing 'Parameters.FunctionName'",
                        name,
                    )
                })?;
            let task = Task::new(name, function_name).shared();
            index.register(&task);
            Ok(State::Task(task))
        }
        "Parallel" => {
            let branch_defs = state_def
                .get("Branches")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    StepTuneError::definition("Parallel state is missing 'Branches'", name)
                })?;
            let mut parallel = Parallel::new(name);
            for branch_def in branch_defs {
                parallel.add_branch(build_workflow(branch_def, index)?);
            }
            Ok(State::Parallel(parallel))
        }
        "Map" => {
            let iterator = state_def.get("Iterator").cloned().ok_or_else(|| {
                StepTuneError::definition("Map state is missing 'Iterator'", name)
            })?;
            let items_path = state_def
                .get("ItemsPath")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    StepTuneError::definition("Map state is missing 'ItemsPath'", name)
                })?;
            Ok(State::Map(Map::new(name, iterator, items_path)))
        }
        other => Err(StepTuneError::definition(
            format!("unsupported state type '{other}'; only Task, Parallel, and Map are supported"),
            name,
        )),
    }
}

impl Workflow {
    /// Re-serialize the structural shape of this workflow: names, types,
    /// nesting, and chain order. Payload fields (inputs, curves, memory
    /// sizes) are not part of the shape.
    #[must_use]
    pub fn to_definition(&self) -> Value {
        let mut states = JsonMap::new();
        let names: Vec<String> = self.states().iter().map(State::name).collect();

        for (position, state) in self.states().iter().enumerate() {
            let mut shape = state_shape(state);
            if let Some(object) = shape.as_object_mut() {
                if let Some(next) = names.get(position + 1) {
                    object.insert("Next".to_string(), json!(next));
                } else {
                    object.insert("End".to_string(), json!(true));
                }
            }
            states.insert(names[position].clone(), shape);
        }

        match names.first() {
            Some(start_at) => json!({ "StartAt": start_at, "States": states }),
            None => json!({ "States": states }),
        }
    }
}

fn state_shape(state: &State) -> Value {
    match state {
        State::Task(task) => json!({
            "Type": "Task",
            "Parameters": { "FunctionName": task.read().function_name() },
        }),
        State::Parallel(parallel) => {
            let branches: Vec<Value> = parallel
                .branches
                .iter()
                .map(Workflow::to_definition)
                .collect();
            json!({ "Type": "Parallel", "Branches": branches })
        }
        State::Map(map) => json!({
            "Type": "Map",
            "Iterator": map.iterator,
            "ItemsPath": map.items_path,
        }),
    }
}
