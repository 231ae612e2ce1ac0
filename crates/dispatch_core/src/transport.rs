use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::protocol::{AgentCommand, AgentTarget};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(1);

/// The two calls the agent exposes. Implementations never fail loudly: every
/// error collapses to `false` so the dispatcher only sees success or failure.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn send(&self, command: &AgentCommand) -> bool;
    async fn health_check(&self) -> bool;
}

/// Where the agent lives right now. Asked again before every request.
#[async_trait]
pub trait AgentTargetSource: Send + Sync {
    async fn agent_target(&self) -> AgentTarget;
}

#[async_trait]
impl AgentTargetSource for AgentTarget {
    async fn agent_target(&self) -> AgentTarget {
        self.clone()
    }
}

/// In-memory target that can be repointed while clients hold it.
#[derive(Debug, Clone, Default)]
pub struct SharedAgentTarget {
    inner: Arc<RwLock<AgentTarget>>,
}

impl SharedAgentTarget {
    pub fn new(target: AgentTarget) -> Self {
        Self {
            inner: Arc::new(RwLock::new(target)),
        }
    }

    pub fn set(&self, target: AgentTarget) {
        match self.inner.write() {
            Ok(mut guard) => *guard = target,
            Err(poisoned) => *poisoned.into_inner() = target,
        }
    }

    pub fn get(&self) -> AgentTarget {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AgentTargetSource for SharedAgentTarget {
    async fn agent_target(&self) -> AgentTarget {
        self.get()
    }
}

pub struct HttpAgentClient {
    http: Client,
    targets: Arc<dyn AgentTargetSource>,
    send_timeout: Duration,
    health_timeout: Duration,
}

impl HttpAgentClient {
    pub fn new(targets: Arc<dyn AgentTargetSource>) -> Self {
        Self {
            http: Client::new(),
            targets,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, send_timeout: Duration, health_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self.health_timeout = health_timeout;
        self
    }

    async fn endpoint(&self, path: &str) -> Option<(Url, AgentTarget)> {
        let target = self.targets.agent_target().await;
        match Url::parse(&target.base_url()).and_then(|base| base.join(path)) {
            Ok(url) => Some((url, target)),
            Err(err) => {
                warn!(host = %target.host, port = target.port, error = %err, "invalid agent address");
                None
            }
        }
    }
}

#[async_trait]
impl AgentTransport for HttpAgentClient {
    async fn send(&self, command: &AgentCommand) -> bool {
        let Some((url, target)) = self.endpoint("command").await else {
            return false;
        };

        let res = self
            .http
            .post(url.clone())
            .bearer_auth(&target.token)
            .timeout(self.send_timeout)
            .json(command)
            .send()
            .await;

        match res {
            Ok(res) if res.status() == StatusCode::OK => true,
            Ok(res) => {
                debug!(
                    request_id = command.request_id(),
                    %url,
                    status = res.status().as_u16(),
                    "agent rejected command"
                );
                false
            }
            Err(err) => {
                debug!(request_id = command.request_id(), %url, error = %err, "agent command request failed");
                false
            }
        }
    }

    async fn health_check(&self) -> bool {
        let Some((url, _)) = self.endpoint("health").await else {
            return false;
        };

        match self
            .http
            .get(url.clone())
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(res) => res.status() == StatusCode::OK,
            Err(err) => {
                debug!(%url, error = %err, "agent health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
