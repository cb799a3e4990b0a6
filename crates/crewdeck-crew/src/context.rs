//! Task context resolution.
//!
//! A task may read the outputs of tasks declared before it. References are
//! resolved against tasks already materialized in the same run, so forward
//! references never resolve.

use crate::config::ContextRef;
use std::sync::Arc;

/// A materialized engine task with the metadata the pipeline tracks.
#[derive(Debug)]
pub struct MaterializedTask<T> {
    /// Identity used in context references.
    pub key: String,
    /// Declared name, also accepted in references.
    pub name: Option<String>,
    /// Position in the configuration.
    pub index: usize,
    /// Key of the agent running the task.
    pub agent_key: String,
    /// Effective flag after the terminal-task rule.
    pub async_execution: bool,
    /// Keys of the tasks this one reads from, in resolution order.
    pub context: Vec<String>,
    /// Engine handle.
    pub task: Arc<T>,
}

impl<T> MaterializedTask<T> {
    fn answers_to(&self, id: &str) -> bool {
        self.key == id || self.name.as_deref() == Some(id)
    }
}

/// Ids referenced by an optional context field.
pub fn normalize_context(context: Option<&ContextRef>) -> Vec<String> {
    context.map(ContextRef::task_ids).unwrap_or_default()
}

/// Result of [`resolve_context`].
#[derive(Debug)]
pub struct ResolvedContext<T> {
    /// Engine handles of the resolved tasks.
    pub tasks: Vec<Arc<T>>,
    /// Keys of the resolved tasks.
    pub keys: Vec<String>,
    /// References that matched no earlier task.
    pub unresolved: Vec<String>,
}

impl<T> ResolvedContext<T> {
    /// True when nothing resolved.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Resolve `ids` against `earlier`, keeping the order of `ids`.
pub fn resolve_context<T>(ids: &[String], earlier: &[MaterializedTask<T>]) -> ResolvedContext<T> {
    let mut resolved = ResolvedContext {
        tasks: Vec::with_capacity(ids.len()),
        keys: Vec::with_capacity(ids.len()),
        unresolved: Vec::new(),
    };

    for id in ids {
        match earlier.iter().find(|t| t.answers_to(id)) {
            // Two ids may name the same task (id and name).
            Some(task) if resolved.keys.contains(&task.key) => {}
            Some(task) => {
                resolved.tasks.push(Arc::clone(&task.task));
                resolved.keys.push(task.key.clone());
            }
            None => resolved.unresolved.push(id.clone()),
        }
    }

    resolved
}

/// Only the last task of a sequence may run asynchronously.
pub fn effective_async(requested: bool, index: usize, total: usize) -> bool {
    requested && index + 1 == total
}
