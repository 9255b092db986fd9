//! ABOUTME: FunctionIndex mapping function names to the Task nodes referencing them
//! ABOUTME: Clone-shared so workflow construction and Map expansion can register tasks

use crate::state::TaskRef;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Mapping from function name to the Task nodes referencing it in the
/// currently expanded workflow.
///
/// Function order is first-seen; per-function task order is insertion order.
/// The index is rebuilt from scratch for each top-level payload. Clones share
/// the same underlying index, which lets the builder register tasks during
/// Map expansion from inside pooled branch futures; mutation is limited to
/// workflow construction and Map expansion, and only read iteration happens
/// during optimization and escalation.
#[derive(Debug, Clone, Default)]
pub struct FunctionIndex {
    inner: Arc<RwLock<IndexInner>>,
}

#[derive(Debug, Default)]
struct IndexInner {
    order: Vec<String>,
    tasks: HashMap<String, Vec<TaskRef>>,
}

impl FunctionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a Task under the function it names
    pub fn register(&self, task: &TaskRef) {
        let function_name = task.read().function_name().to_string();
        let mut inner = self.inner.write();
        let entry = inner.tasks.entry(function_name.clone()).or_default();
        entry.push(Arc::clone(task));
        if !inner.order.contains(&function_name) {
            inner.order.push(function_name);
        }
    }

    /// Function names in first-seen order
    #[must_use]
    pub fn function_names(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Tasks registered for one function, in insertion order
    #[must_use]
    pub fn tasks(&self, function_name: &str) -> Vec<TaskRef> {
        self.inner
            .read()
            .tasks
            .get(function_name)
            .cloned()
            .unwrap_or_default()
    }

    /// All `(function, tasks)` pairs in first-seen function order
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, Vec<TaskRef>)> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    inner.tasks.get(name).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Number of distinct functions
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }

    /// Total number of registered tasks across all functions
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.inner.read().tasks.values().map(Vec::len).sum()
    }

    /// Restore every task's current memory size to its cost-optimal
    /// assignment
    pub fn reset_memory_sizes(&self) {
        for (_, tasks) in self.snapshot() {
            for task in tasks {
                task.write().reset_memory();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Task;

    #[test]
    fn test_first_seen_function_order() {
        let index = FunctionIndex::new();
        index.register(&Task::new("A", "beta").shared());
        index.register(&Task::new("B", "alpha").shared());
        index.register(&Task::new("C", "beta").shared());

        assert_eq!(index.function_names(), vec!["beta", "alpha"]);
        assert_eq!(index.tasks("beta").len(), 2);
        assert_eq!(index.tasks("alpha").len(), 1);
        assert_eq!(index.task_count(), 3);
    }

    #[test]
    fn test_clones_share_state() {
        let index = FunctionIndex::new();
        let clone = index.clone();
        clone.register(&Task::new("A", "f").shared());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_reset_memory_sizes() {
        let index = FunctionIndex::new();
        let task = Task::new("A", "f").shared();
        task.write().assign_memory(256, 3008);
        task.write().increase_memory(512);
        index.register(&task);

        index.reset_memory_sizes();
        assert_eq!(task.read().memory_size(), 256);
    }

    #[test]
    fn test_unknown_function_is_empty() {
        let index = FunctionIndex::new();
        assert!(index.tasks("nope").is_empty());
        assert!(index.is_empty());
    }
}
