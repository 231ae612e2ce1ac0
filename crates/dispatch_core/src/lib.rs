//! Turns control triggers into agent commands and delivers them in the background.
//!
//! The pieces, leaves first:
//! - [`mapping`]: pure action-definition to [`AgentCommand`] transform.
//! - [`transport`]: HTTP client for the agent's `/command` and `/health` endpoints.
//! - [`dispatcher`]: FIFO queue drained by one worker with fixed retry backoff,
//!   plus the health prober feeding [`HealthStatus`].
//! - [`router`]: picks the actions matching a trigger and splits local from remote ones.

pub mod dispatcher;
pub mod error;
pub mod health;
pub mod mapping;
pub mod router;
pub mod settings;
pub mod transport;

pub use dispatcher::{DeliveryOutcome, DeliveryReport, DispatchConfig, Dispatcher};
pub use error::DispatchError;
pub use health::HealthStatus;
pub use mapping::{action_to_command, build_request_id, resolve_placeholders};
pub use router::{ActionSource, FireOutcome, LocalAction, TriggerRouter};
pub use settings::SettingsTargetSource;
pub use shared::{
    domain::ActionDefinition,
    error::MappingError,
    protocol::{AgentCommand, AgentTarget, DispatchContext},
};
pub use transport::{AgentTargetSource, AgentTransport, HttpAgentClient, SharedAgentTarget};
