use serde_json::{Map, Value};
use shared::{
    domain::ActionDefinition,
    error::MappingError,
    protocol::{new_request_id, AgentCommand, DispatchContext},
};

const VALUE_PLACEHOLDER: &str = "${value}";
const STATE_PLACEHOLDER: &str = "${state}";

pub fn build_request_id() -> String {
    new_request_id()
}

/// Replaces strings that are exactly `${value}` or `${state}` anywhere inside
/// `template`. Tokens embedded in longer strings are left as they are, and so
/// is a placeholder whose context entry is absent.
pub fn resolve_placeholders(template: &Value, context: &DispatchContext) -> Value {
    match template {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), resolve_placeholders(value, context)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_placeholders(item, context))
                .collect(),
        ),
        Value::String(text) => {
            let replacement = match text.as_str() {
                VALUE_PLACEHOLDER => context.value.as_ref(),
                STATE_PLACEHOLDER => context.state.as_ref(),
                _ => None,
            };
            replacement.cloned().unwrap_or_else(|| template.clone())
        }
        other => other.clone(),
    }
}

/// Resolves a stored action into a ready-to-send command.
///
/// `request_id` is reused when given so a caller can resubmit the same logical
/// command; otherwise a new id is generated.
pub fn action_to_command(
    action: &ActionDefinition,
    request_id: Option<String>,
    context: Option<&DispatchContext>,
) -> Result<AgentCommand, MappingError> {
    let document: Value = serde_json::from_str(&action.payload_template).map_err(|source| {
        MappingError::MalformedAction {
            action_id: action.id,
            source,
        }
    })?;

    let Value::Object(mut document) = document else {
        return Err(invalid(action, "template must be a JSON object"));
    };
    let name = match document.remove("action") {
        Some(Value::String(name)) => name,
        Some(_) => return Err(invalid(action, "'action' must be a string")),
        None => return Err(invalid(action, "template must include 'action'")),
    };
    let Some(mut payload) = document.remove("payload") else {
        return Err(invalid(action, "template must include 'payload'"));
    };

    if let Some(context) = context.filter(|context| !context.is_empty()) {
        payload = resolve_placeholders(&payload, context);
        if let (Some(key), Some(value), Value::Object(fields)) =
            (action.value_key.as_ref(), context.value.as_ref(), &mut payload)
        {
            fields.insert(key.clone(), value.clone());
        }
    }

    Ok(AgentCommand::with_request_id(
        request_id.unwrap_or_else(build_request_id),
        name,
        payload,
    ))
}

fn invalid(action: &ActionDefinition, reason: &'static str) -> MappingError {
    MappingError::InvalidAction {
        action_id: action.id,
        reason,
    }
}

#[cfg(test)]
#[path = "tests/mapping_tests.rs"]
mod tests;
