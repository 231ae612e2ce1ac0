use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /command`. Constructed once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCommand {
    request_id: String,
    action: String,
    payload: Value,
}

impl AgentCommand {
    /// Builds a command under a freshly generated request id.
    pub fn new(action: impl Into<String>, payload: Value) -> Self {
        Self::with_request_id(new_request_id(), action, payload)
    }

    pub fn with_request_id(
        request_id: impl Into<String>,
        action: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            action: action.into(),
            payload,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Live values captured by the UI when a trigger fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl DispatchContext {
    pub fn with_value(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            state: None,
        }
    }

    pub fn with_state(state: impl Into<Value>) -> Self {
        Self {
            value: None,
            state: Some(state.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.state.is_none()
    }
}

pub const DEFAULT_AGENT_HOST: &str = "127.0.0.1";
pub const DEFAULT_AGENT_PORT: u16 = 8765;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTarget {
    pub host: String,
    pub port: u16,
    pub token: String,
}

impl Default for AgentTarget {
    fn default() -> Self {
        Self {
            host: DEFAULT_AGENT_HOST.into(),
            port: DEFAULT_AGENT_PORT,
            token: String::new(),
        }
    }
}

impl AgentTarget {
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            token: token.into(),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_serializes_wire_shape() {
        let command = AgentCommand::with_request_id("req-1", "run_app", json!({"app": "notepad"}));
        assert_eq!(
            serde_json::to_value(&command).expect("serialize"),
            json!({"request_id": "req-1", "action": "run_app", "payload": {"app": "notepad"}})
        );
    }

    #[test]
    fn generated_request_ids_differ() {
        let a = AgentCommand::new("key_press", Value::Null);
        let b = AgentCommand::new("key_press", Value::Null);
        assert!(!a.request_id().is_empty());
        assert_ne!(a.request_id(), b.request_id());
    }
}
