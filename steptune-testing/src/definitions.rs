//! ABOUTME: Workflow definition JSON fixtures shared by steptune tests
//! ABOUTME: Builders for linear chains, parallel fan-outs, and map states

use serde_json::{json, Map, Value};

/// A linear chain of Task states: `[(state_name, function_name), ...]`
#[must_use]
pub fn linear_chain(tasks: &[(&str, &str)]) -> Value {
    let mut states = Map::new();
    for (position, (name, function)) in tasks.iter().enumerate() {
        let mut state = json!({
            "Type": "Task",
            "Parameters": { "FunctionName": function },
        });
        match tasks.get(position + 1) {
            Some((next, _)) => state["Next"] = json!(next),
            None => state["End"] = json!(true),
        }
        states.insert((*name).to_string(), state);
    }
    json!({ "StartAt": tasks[0].0, "States": states })
}

/// A workflow that is a single Parallel state over the given branch
/// definitions
#[must_use]
pub fn single_parallel(name: &str, branches: Vec<Value>) -> Value {
    json!({
        "StartAt": name,
        "States": {
            name: {
                "Type": "Parallel",
                "Branches": branches,
                "End": true,
            },
        },
    })
}

/// A workflow that is a single Map state over the given iterator definition
#[must_use]
pub fn single_map(name: &str, items_path: &str, iterator: Value) -> Value {
    json!({
        "StartAt": name,
        "States": {
            name: {
                "Type": "Map",
                "ItemsPath": items_path,
                "Iterator": iterator,
                "End": true,
            },
        },
    })
}
