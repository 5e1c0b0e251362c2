use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload a task hands to the next task.
///
/// Both fields are optional; `TaskOutput::default()` is the empty payload,
/// which is a value in its own right and not the same as "no result".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Key/value data for the next task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    /// Caller-defined value carried along untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Value>,
}

/// What a task produced: `None` means "nothing to pass forward".
pub type TaskResult = Option<TaskOutput>;

impl TaskOutput {
    /// The `{}` payload: present, but with neither data nor scope.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a payload from a JSON value. Objects become `data` as-is; any
    /// other value is stored under the `"value"` key.
    pub fn with_data(data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            data: Some(data),
            scope: None,
        }
    }

    pub fn scope(mut self, scope: Value) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Look up a single data entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }
}

/// Where a scheduler's drive loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveState {
    /// No job in flight and nothing holding the queue.
    Idle,
    /// The drive loop owns a job, or is about to take the next one.
    Running,
    /// Parked between jobs because pause tokens are outstanding.
    Paused,
    /// A task failed; nothing else runs until the scheduler is cleared.
    Stalled,
}

impl std::fmt::Display for DriveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DriveState::Idle => "idle",
            DriveState::Running => "running",
            DriveState::Paused => "paused",
            DriveState::Stalled => "stalled",
        };
        write!(f, "{s}")
    }
}
