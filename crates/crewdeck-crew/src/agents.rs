use crate::config::{non_blank, AgentSpec};
use std::sync::Arc;

/// Identity of an agent: name, then role, then `agent_N` with N the
/// 1-based position.
pub fn agent_key(spec: &AgentSpec, index: usize) -> String {
    non_blank(spec.name.as_deref())
        .or_else(|| non_blank(spec.role.as_deref()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("agent_{}", index + 1))
}

/// An engine agent plus the key it was materialized under.
#[derive(Debug)]
pub struct MaterializedAgent<A> {
    /// Identity used for task assignment.
    pub key: String,
    /// Position of the spec in the configuration.
    pub index: usize,
    /// Engine handle.
    pub agent: Arc<A>,
}

/// Agents keyed by identity, in configuration order.
#[derive(Debug)]
pub struct AgentSet<A> {
    entries: Vec<MaterializedAgent<A>>,
}

impl<A> Default for AgentSet<A> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<A> AgentSet<A> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an agent. An existing agent with the same key is replaced in
    /// place and returned.
    pub fn insert(&mut self, entry: MaterializedAgent<A>) -> Option<MaterializedAgent<A>> {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(slot) => Some(std::mem::replace(slot, entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    /// Agent stored under `key`.
    pub fn get(&self, key: &str) -> Option<&MaterializedAgent<A>> {
        self.entries.iter().find(|e| e.key == key)
    }

    /// The agent tasks fall back to when their own is missing.
    pub fn first(&self) -> Option<&MaterializedAgent<A>> {
        self.entries.first()
    }

    /// Keys in configuration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    /// Entries in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &MaterializedAgent<A>> {
        self.entries.iter()
    }

    /// Engine agents in order, for crew assembly.
    pub fn agents(&self) -> Vec<Arc<A>> {
        self.entries.iter().map(|e| Arc::clone(&e.agent)).collect()
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no agent was created.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every agent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
