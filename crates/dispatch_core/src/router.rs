use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{ActionDefinition, ActionId, ActionType, ControlId, ScreenId, Trigger},
    error::MappingError,
    protocol::DispatchContext,
};
use storage::Storage;
use tracing::{debug, warn};

use crate::{dispatcher::Dispatcher, error::DispatchError};

#[async_trait]
pub trait ActionSource: Send + Sync {
    async fn actions_for_control(&self, control_id: ControlId) -> Result<Vec<ActionDefinition>>;
}

#[async_trait]
impl ActionSource for Storage {
    async fn actions_for_control(&self, control_id: ControlId) -> Result<Vec<ActionDefinition>> {
        self.list_actions_for_control(control_id).await
    }
}

/// Reactions the panel performs itself rather than sending to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalAction {
    NavigateScreen(ScreenId),
    ShowResolution,
}

#[derive(Debug, Default)]
pub struct FireOutcome {
    /// Request ids of commands handed to the dispatcher, in action order.
    pub queued: Vec<String>,
    pub local: Vec<LocalAction>,
    pub rejected: Vec<(ActionId, MappingError)>,
}

pub struct TriggerRouter {
    actions: Arc<dyn ActionSource>,
    dispatcher: Arc<Dispatcher>,
}

impl TriggerRouter {
    pub fn new(actions: Arc<dyn ActionSource>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            actions,
            dispatcher,
        }
    }

    /// Runs every action of `control_id` bound to `trigger`. A bad action is
    /// reported in [`FireOutcome::rejected`] without stopping the others.
    pub async fn fire(
        &self,
        control_id: ControlId,
        trigger: &Trigger,
        context: Option<&DispatchContext>,
    ) -> Result<FireOutcome> {
        let actions = self.actions.actions_for_control(control_id).await?;
        let mut outcome = FireOutcome::default();

        for action in actions.iter().filter(|action| &action.trigger == trigger) {
            match &action.action_type {
                ActionType::NavigateScreen => match navigation_target(action) {
                    Some(screen_id) => outcome.local.push(LocalAction::NavigateScreen(screen_id)),
                    None => warn!(action_id = action.id.0, "navigation action has no usable screen_id"),
                },
                ActionType::ShowResolution => outcome.local.push(LocalAction::ShowResolution),
                _ => match self.dispatcher.enqueue_action(action, None, context) {
                    Ok(request_id) => outcome.queued.push(request_id),
                    Err(DispatchError::Mapping(err)) => {
                        warn!(action_id = action.id.0, error = %err, "rejected action definition");
                        outcome.rejected.push((action.id, err));
                    }
                    Err(err) => return Err(err.into()),
                },
            }
        }

        debug!(
            control_id = control_id.0,
            trigger = %trigger,
            queued = outcome.queued.len(),
            local = outcome.local.len(),
            rejected = outcome.rejected.len(),
            "trigger fired"
        );
        Ok(outcome)
    }
}

fn navigation_target(action: &ActionDefinition) -> Option<ScreenId> {
    let document: Value = serde_json::from_str(&action.payload_template).ok()?;
    let screen_id = document.get("screen_id")?;
    screen_id
        .as_i64()
        .or_else(|| screen_id.as_str().and_then(|raw| raw.trim().parse().ok()))
        .map(ScreenId)
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
