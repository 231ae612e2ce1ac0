use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::AgentTarget;
use storage::{Storage, SETTING_AGENT_HOST, SETTING_AGENT_PORT, SETTING_AGENT_TOKEN};
use tracing::warn;

use crate::transport::AgentTargetSource;

/// Reads the agent address from the settings table on every call, so edits
/// made from the settings screen apply to the next request.
#[derive(Clone)]
pub struct SettingsTargetSource {
    storage: Storage,
}

impl SettingsTargetSource {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    async fn load(&self) -> Result<AgentTarget> {
        let defaults = AgentTarget::default();
        let host = self
            .storage
            .setting_value(SETTING_AGENT_HOST)
            .await?
            .unwrap_or(defaults.host);
        let port = match self.storage.setting_value(SETTING_AGENT_PORT).await? {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                warn!(value = %raw, "ignoring unparseable agent port setting");
                defaults.port
            }),
            None => defaults.port,
        };
        let token = self
            .storage
            .setting_value(SETTING_AGENT_TOKEN)
            .await?
            .unwrap_or(defaults.token);
        Ok(AgentTarget { host, port, token })
    }
}

#[async_trait]
impl AgentTargetSource for SettingsTargetSource {
    async fn agent_target(&self) -> AgentTarget {
        match self.load().await {
            Ok(target) => target,
            Err(err) => {
                warn!(error = %err, "failed to read agent settings; using defaults");
                AgentTarget::default()
            }
        }
    }
}
