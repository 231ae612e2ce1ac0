use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::transport::AgentTransport;

/// Last known reachability of the agent. Written by the prober only.
#[derive(Debug, Default)]
pub struct HealthStatus {
    ok: AtomicBool,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.ok.load(Ordering::Acquire)
    }

    /// Stores `ok` and returns the previous value.
    pub(crate) fn publish(&self, ok: bool) -> bool {
        self.ok.swap(ok, Ordering::AcqRel)
    }
}

pub(crate) async fn health_loop(
    transport: Arc<dyn AgentTransport>,
    status: Arc<HealthStatus>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let ok = tokio::select! {
            ok = transport.health_check() => ok,
            _ = shutdown.changed() => break,
        };
        let previous = status.publish(ok);
        if previous != ok {
            if ok {
                info!("agent reachable");
            } else {
                warn!("agent unreachable");
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }
    }
    info!("agent health prober stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_returns_previous_value() {
        let status = HealthStatus::default();
        assert!(!status.is_ok());
        assert!(!status.publish(true));
        assert!(status.is_ok());
        assert!(status.publish(false));
        assert!(!status.is_ok());
    }
}
