use thiserror::Error;

use crate::domain::ActionId;

/// Bad action configuration detected while building an agent command.
/// These are never retried; the caller is expected to surface them.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("malformed payload template for action {}: {source}", action_id.0)]
    MalformedAction {
        action_id: ActionId,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid payload template for action {}: {reason}", action_id.0)]
    InvalidAction {
        action_id: ActionId,
        reason: &'static str,
    },
}

impl MappingError {
    pub fn action_id(&self) -> ActionId {
        match self {
            Self::MalformedAction { action_id, .. } | Self::InvalidAction { action_id, .. } => {
                *action_id
            }
        }
    }
}
