use async_trait::async_trait;
use crewdeck_core::{CrewError, CrewResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A configured tool, as declared in `[[tools]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique identifier, referenced from agent `tools` lists.
    pub id: String,
    /// Display name; also accepted as a lookup key.
    pub title: String,
    /// What the tool does.
    #[serde(default)]
    pub description: String,
    /// Disabled tools are never handed to agents.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Tool-specific settings.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Owning group; `None` means shared by every group.
    #[serde(default)]
    pub group_id: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// A tool instance handed to an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolHandle {
    /// Identifier of the definition it was built from.
    pub id: String,
    /// Name the agent sees.
    pub name: String,
    /// Description the agent sees.
    pub description: String,
    /// Settings copied from the definition.
    pub config: Map<String, Value>,
}

/// Looks tools up by identifier.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Find an enabled tool by identifier.
    async fn get_tool(&self, id: &str) -> CrewResult<Option<ToolDefinition>>;

    /// The view of this service a member of `group_id` may use.
    fn scoped_to_group(&self, group_id: &str) -> Arc<dyn ToolService>;
}

/// Turns a tool definition into an instance.
#[async_trait]
pub trait ToolFactory: Send + Sync {
    /// Build an instance of `definition`.
    async fn create_tool(&self, definition: &ToolDefinition) -> CrewResult<ToolHandle>;
}

/// In-memory [`ToolService`] over configured definitions.
///
/// Tools are found by id first, then by title. When several tools share a
/// title, the one with the lowest id wins. Disabled tools are never
/// returned.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `definitions`.
    pub fn with_tools(definitions: impl IntoIterator<Item = ToolDefinition>) -> Self {
        let mut registry = Self::new();
        for def in definitions {
            registry.register(def);
        }
        registry
    }

    /// Add a definition, replacing any existing one with the same id.
    pub fn register(&mut self, definition: ToolDefinition) {
        if self.tools.contains_key(&definition.id) {
            warn!(tool = %definition.id, "Replacing existing tool definition");
        } else if self
            .tools
            .values()
            .any(|t| t.title == definition.title)
        {
            warn!(
                tool = %definition.id,
                title = %definition.title,
                "Tool title already registered; title lookups resolve to the lowest id"
            );
        }
        self.tools.insert(definition.id.clone(), definition);
    }

    /// Look a definition up by id, then by title.
    pub fn get(&self, id: &str) -> Option<&ToolDefinition> {
        self.tools.get(id).or_else(|| {
            self.tools
                .values()
                .filter(|t| t.title == id)
                .min_by(|a, b| a.id.cmp(&b.id))
        })
    }

    /// Tools visible to `group_id`: its own plus shared ones.
    pub fn for_group(&self, group_id: &str) -> ToolRegistry {
        Self::with_tools(
            self.tools
                .values()
                .filter(|t| t.group_id.as_deref().map_or(true, |g| g == group_id))
                .cloned(),
        )
    }

    /// Enabled tool ids, sorted.
    pub fn list_enabled(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .tools
            .values()
            .filter(|t| t.enabled)
            .map(|t| t.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered definitions.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no definitions.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolService for ToolRegistry {
    async fn get_tool(&self, id: &str) -> CrewResult<Option<ToolDefinition>> {
        Ok(self.get(id).filter(|t| t.enabled).cloned())
    }

    fn scoped_to_group(&self, group_id: &str) -> Arc<dyn ToolService> {
        Arc::new(self.for_group(group_id))
    }
}

/// Builds [`ToolHandle`]s straight from definitions.
#[derive(Debug, Clone, Default)]
pub struct RegistryToolFactory;

#[async_trait]
impl ToolFactory for RegistryToolFactory {
    async fn create_tool(&self, definition: &ToolDefinition) -> CrewResult<ToolHandle> {
        if !definition.enabled {
            return Err(CrewError::Tool(format!(
                "tool '{}' is disabled",
                definition.id
            )));
        }
        Ok(ToolHandle {
            id: definition.id.clone(),
            name: definition.title.clone(),
            description: definition.description.clone(),
            config: definition.config.clone(),
        })
    }
}

/// Resolve tool ids into instances, skipping unknown ids.
pub async fn resolve_tools(
    ids: &[String],
    service: &dyn ToolService,
    factory: &dyn ToolFactory,
) -> CrewResult<Vec<ToolHandle>> {
    let mut handles = Vec::with_capacity(ids.len());
    for id in ids {
        match service.get_tool(id).await? {
            Some(def) => handles.push(factory.create_tool(&def).await?),
            None => warn!(tool = %id, "Tool not found or disabled, skipping"),
        }
    }
    debug!(requested = ids.len(), resolved = handles.len(), "Resolved tools");
    Ok(handles)
}
