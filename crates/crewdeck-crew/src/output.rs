use crewdeck_core::CrewError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::error;

/// Output of one task inside a crew run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Key of the task that produced this output.
    pub task_key: String,
    /// Key of the agent that ran the task.
    pub agent: String,
    /// Raw text output.
    pub raw: String,
}

/// Token counts reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent to the model.
    pub prompt_tokens: u64,
    /// Tokens generated by the model.
    pub completion_tokens: u64,
    /// Sum of prompt and completion tokens.
    pub total_tokens: u64,
}

/// Crew-native result: the final raw payload plus per-task outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewRun {
    /// Final output.
    pub raw: String,
    /// Outputs of the individual tasks.
    #[serde(default)]
    pub tasks_output: Vec<TaskOutput>,
    /// Token counts, if the engine reported them.
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
}

impl CrewRun {
    /// Run with only a final output.
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            tasks_output: Vec::new(),
            token_usage: None,
        }
    }
}

/// Every shape an engine kickoff may produce.
#[derive(Debug, Clone, PartialEq)]
pub enum KickoffResult {
    /// A mapping, returned as-is.
    Mapping(Map<String, Value>),
    /// A crew-native result.
    Crew(CrewRun),
    /// Plain text output.
    Text(String),
    /// Anything else, described for the error message.
    Unrecognized(String),
}

impl From<Value> for KickoffResult {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => KickoffResult::Mapping(map),
            Value::String(s) => KickoffResult::Text(s),
            Value::Null => KickoffResult::Unrecognized("engine returned null".to_string()),
            Value::Bool(_) => KickoffResult::Unrecognized("unsupported result type bool".to_string()),
            Value::Number(_) => {
                KickoffResult::Unrecognized("unsupported result type number".to_string())
            }
            Value::Array(_) => {
                KickoffResult::Unrecognized("unsupported result type array".to_string())
            }
        }
    }
}

/// Normalized result of [`execute`](crate::CrewPreparation::execute).
///
/// Serializes to the success mapping as-is, or to exactly
/// `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExecutionOutput {
    /// Failure, serialized as `{"error": "<message>"}`.
    Error {
        /// Error message.
        error: String,
    },
    /// Successful result mapping.
    Success(Map<String, Value>),
}

impl ExecutionOutput {
    /// Error output carrying `message`.
    pub fn error(message: impl Into<String>) -> Self {
        ExecutionOutput::Error {
            error: message.into(),
        }
    }

    /// `{"result": <result>, "type": <kind>}`.
    pub fn typed(result: impl Into<Value>, kind: &str) -> Self {
        let mut map = Map::new();
        map.insert("result".to_string(), result.into());
        map.insert("type".to_string(), Value::String(kind.to_string()));
        ExecutionOutput::Success(map)
    }

    /// True for error outputs.
    pub fn is_error(&self) -> bool {
        matches!(self, ExecutionOutput::Error { .. })
    }

    /// The message of an error output.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExecutionOutput::Error { error } => Some(error),
            ExecutionOutput::Success(_) => None,
        }
    }

    /// The `result` field of a success mapping.
    pub fn result(&self) -> Option<&Value> {
        match self {
            ExecutionOutput::Success(map) => map.get("result"),
            ExecutionOutput::Error { .. } => None,
        }
    }

    /// The JSON form, same as the serialized one.
    pub fn to_value(&self) -> Value {
        match self {
            ExecutionOutput::Error { error } => json!({ "error": error }),
            ExecutionOutput::Success(map) => Value::Object(map.clone()),
        }
    }

    /// A single string `error` key reads back as an error; any other
    /// mapping is a success.
    pub fn from_map(map: Map<String, Value>) -> Self {
        if map.len() == 1 {
            if let Some(Value::String(error)) = map.get("error") {
                return ExecutionOutput::error(error.clone());
            }
        }
        ExecutionOutput::Success(map)
    }
}

impl<'de> Deserialize<'de> for ExecutionOutput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(ExecutionOutput::from_map)
    }
}

/// Map a kickoff result onto the canonical output shape.
pub fn process_crew_output(result: KickoffResult) -> ExecutionOutput {
    match result {
        KickoffResult::Mapping(map) => ExecutionOutput::Success(map),
        KickoffResult::Crew(run) => ExecutionOutput::typed(run.raw, "crew_result"),
        KickoffResult::Text(text) => ExecutionOutput::typed(text, "processed"),
        KickoffResult::Unrecognized(shape) => {
            let err = CrewError::OutputProcessing(shape);
            error!("{err}");
            ExecutionOutput::error(err.to_string())
        }
    }
}
