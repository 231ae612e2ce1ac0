use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use shared::{
    domain::ActionDefinition,
    protocol::{AgentCommand, DispatchContext},
};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::DispatchError,
    health::{health_loop, HealthStatus},
    mapping::action_to_command,
    transport::AgentTransport,
};

/// Pause before each attempt: the first fires immediately, then 0.5s, then 1s.
pub const DEFAULT_RETRY_BACKOFFS: [Duration; 3] = [
    Duration::ZERO,
    Duration::from_millis(500),
    Duration::from_millis(1000),
];
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// One entry per attempt; the entry is the delay before that attempt.
    pub retry_backoffs: Vec<Duration>,
    pub health_interval: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_backoffs: DEFAULT_RETRY_BACKOFFS.to_vec(),
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Every attempt failed and the command was dropped.
    Exhausted,
}

/// Emitted once per command when the worker is done with it.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub request_id: String,
    pub action: String,
    pub attempts: usize,
    pub outcome: DeliveryOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Queues agent commands and delivers them one at a time, in order, from a
/// background task. A second task keeps [`HealthStatus`] fresh.
///
/// The queue is unbounded: producers are UI gestures, so volume is limited by
/// how fast a person can tap. Both tasks stop on [`Dispatcher::shutdown`] or
/// when the dispatcher is dropped.
pub struct Dispatcher {
    queue: mpsc::UnboundedSender<AgentCommand>,
    health: Arc<HealthStatus>,
    shutdown: watch::Sender<bool>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Spawns the worker and prober on the current Tokio runtime.
    pub fn start(transport: Arc<dyn AgentTransport>, config: DispatchConfig) -> Self {
        Self::start_with_reports(transport, config, None)
    }

    /// Like [`Dispatcher::start`], additionally sending a [`DeliveryReport`]
    /// for every finished command. Without a report channel failures stay silent.
    pub fn start_with_reports(
        transport: Arc<dyn AgentTransport>,
        config: DispatchConfig,
        reports: Option<mpsc::UnboundedSender<DeliveryReport>>,
    ) -> Self {
        let (queue, queue_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let health = Arc::new(HealthStatus::default());

        let worker = tokio::spawn(dispatch_worker(
            Arc::clone(&transport),
            queue_rx,
            config.retry_backoffs.clone(),
            reports,
            shutdown_rx.clone(),
        ));
        let prober = tokio::spawn(health_loop(
            transport,
            Arc::clone(&health),
            config.health_interval,
            shutdown_rx,
        ));

        info!(
            attempts = config.retry_backoffs.len().max(1),
            health_interval_ms = config.health_interval.as_millis() as u64,
            "action dispatcher started"
        );

        Self {
            queue,
            health,
            shutdown,
            tasks: std::sync::Mutex::new(vec![worker, prober]),
        }
    }

    /// Queues an already resolved command.
    pub fn enqueue(&self, command: AgentCommand) -> Result<(), DispatchError> {
        debug!(
            request_id = command.request_id(),
            action = command.action(),
            "command pending"
        );
        self.queue
            .send(command)
            .map_err(|_| DispatchError::QueueClosed)
    }

    /// Maps `action` and queues the result, returning its request id. Mapping
    /// errors are returned before anything reaches the queue.
    pub fn enqueue_action(
        &self,
        action: &ActionDefinition,
        request_id: Option<String>,
        context: Option<&DispatchContext>,
    ) -> Result<String, DispatchError> {
        let command = action_to_command(action, request_id, context)?;
        let request_id = command.request_id().to_string();
        self.enqueue(command)?;
        Ok(request_id)
    }

    pub fn last_health_ok(&self) -> bool {
        self.health.is_ok()
    }

    /// Stops both background tasks and waits for them. Commands still queued
    /// are abandoned; later enqueues fail with [`DispatchError::QueueClosed`].
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let tasks = match self.tasks.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for task in tasks {
            if let Err(err) = task.await {
                error!(error = %err, "dispatcher task failed");
            }
        }
        info!("action dispatcher stopped");
    }
}

async fn dispatch_worker(
    transport: Arc<dyn AgentTransport>,
    mut queue: mpsc::UnboundedReceiver<AgentCommand>,
    backoffs: Vec<Duration>,
    reports: Option<mpsc::UnboundedSender<DeliveryReport>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let schedule = if backoffs.is_empty() {
        vec![Duration::ZERO]
    } else {
        backoffs
    };

    loop {
        let command = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = queue.recv() => match next {
                Some(command) => command,
                None => break,
            },
        };

        let Some((attempts, outcome)) =
            deliver(transport.as_ref(), &command, &schedule, &mut shutdown).await
        else {
            break;
        };

        match outcome {
            DeliveryOutcome::Delivered => debug!(
                request_id = command.request_id(),
                attempts,
                "command delivered"
            ),
            DeliveryOutcome::Exhausted => warn!(
                request_id = command.request_id(),
                action = command.action(),
                attempts,
                "command dropped after exhausting retries"
            ),
        }

        if let Some(reports) = &reports {
            let _ = reports.send(DeliveryReport {
                request_id: command.request_id().to_string(),
                action: command.action().to_string(),
                attempts,
                outcome,
                finished_at: Utc::now(),
            });
        }
    }
    info!("action dispatch worker stopped");
}

/// Runs the retry schedule for one command. `None` means shutdown interrupted it.
async fn deliver(
    transport: &dyn AgentTransport,
    command: &AgentCommand,
    schedule: &[Duration],
    shutdown: &mut watch::Receiver<bool>,
) -> Option<(usize, DeliveryOutcome)> {
    for (index, delay) in schedule.iter().enumerate() {
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(*delay) => {}
                _ = shutdown.changed() => return None,
            }
        }

        let attempt = index + 1;
        debug!(request_id = command.request_id(), attempt, "sending command");
        if transport.send(command).await {
            return Some((attempt, DeliveryOutcome::Delivered));
        }
        debug!(request_id = command.request_id(), attempt, "send attempt failed");
    }
    Some((schedule.len(), DeliveryOutcome::Exhausted))
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
