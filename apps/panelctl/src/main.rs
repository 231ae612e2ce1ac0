use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dispatch_core::{
    AgentCommand, AgentTransport, DeliveryOutcome, DeliveryReport, DispatchContext, Dispatcher,
    HttpAgentClient, SettingsTargetSource, TriggerRouter,
};
use serde_json::Value;
use shared::domain::{ControlId, Trigger};
use storage::Storage;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, PanelSettings};

/// Covers the full retry schedule including a timed-out send per attempt.
const REPORT_WAIT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(about = "Operate the touch panel's agent dispatch from a terminal")]
struct Cli {
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the stock screens, controls, actions and agent settings.
    Seed,
    /// Write a settings row, e.g. `agent_host` or `agent_token`.
    SetSetting {
        key: String,
        value: String,
    },
    /// Fire a control trigger the way the panel UI would.
    Fire {
        control_id: i64,
        trigger: String,
        /// JSON value substituted for `${value}`.
        #[arg(long)]
        value: Option<String>,
        /// JSON value substituted for `${state}`.
        #[arg(long)]
        state: Option<String>,
    },
    /// Send a raw command to the agent.
    Send {
        action: String,
        payload: String,
    },
    /// Probe the agent's health endpoint once; exits non-zero when offline.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, config_warnings) = load_settings();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    for warning in &config_warnings {
        tracing::warn!("{warning}");
    }

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .clone()
        .unwrap_or_else(|| settings.database_url.clone());
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open panel database '{database_url}'"))?;
    tracing::debug!(%database_url, "panel database ready");

    match cli.command {
        Command::Seed => {
            if storage.insert_seed_data().await? {
                println!("seeded {database_url}");
            } else {
                println!("{database_url} already has a layout; nothing to do");
            }
        }
        Command::SetSetting { key, value } => {
            storage.set_setting(&key, value.trim()).await?;
            println!("{key} = {}", value.trim());
        }
        Command::Health => {
            let client = agent_client(&storage, &settings);
            let ok = client.health_check().await;
            println!("agent {}", if ok { "online" } else { "offline" });
            if !ok {
                std::process::exit(1);
            }
        }
        Command::Fire {
            control_id,
            trigger,
            value,
            state,
        } => {
            let context = DispatchContext {
                value: value.as_deref().map(parse_json_arg).transpose()?,
                state: state.as_deref().map(parse_json_arg).transpose()?,
            };
            let (dispatcher, mut reports) = start_dispatcher(&storage, &settings);
            let router = TriggerRouter::new(Arc::new(storage.clone()), Arc::clone(&dispatcher));

            let outcome = router
                .fire(
                    ControlId(control_id),
                    &Trigger::from(trigger),
                    (!context.is_empty()).then_some(&context),
                )
                .await?;
            for local in &outcome.local {
                println!("local action: {local:?}");
            }
            for (action_id, err) in &outcome.rejected {
                eprintln!("action {} rejected: {err}", action_id.0);
            }
            let delivered = await_reports(&mut reports, outcome.queued.len()).await;
            dispatcher.shutdown().await;
            if delivered < outcome.queued.len() || !outcome.rejected.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Send { action, payload } => {
            let payload = parse_json_arg(&payload)?;
            let (dispatcher, mut reports) = start_dispatcher(&storage, &settings);
            dispatcher.enqueue(AgentCommand::new(action, payload))?;
            let delivered = await_reports(&mut reports, 1).await;
            dispatcher.shutdown().await;
            if delivered == 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn agent_client(storage: &Storage, settings: &PanelSettings) -> HttpAgentClient {
    HttpAgentClient::new(Arc::new(SettingsTargetSource::new(storage.clone())))
        .with_timeouts(settings.send_timeout(), settings.health_timeout())
}

fn start_dispatcher(
    storage: &Storage,
    settings: &PanelSettings,
) -> (Arc<Dispatcher>, mpsc::UnboundedReceiver<DeliveryReport>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher = Dispatcher::start_with_reports(
        Arc::new(agent_client(storage, settings)),
        settings.dispatch_config(),
        Some(tx),
    );
    (Arc::new(dispatcher), rx)
}

/// Prints each report as it arrives and returns how many were delivered.
async fn await_reports(
    reports: &mut mpsc::UnboundedReceiver<DeliveryReport>,
    expected: usize,
) -> usize {
    let mut delivered = 0;
    for _ in 0..expected {
        match tokio::time::timeout(REPORT_WAIT, reports.recv()).await {
            Ok(Some(report)) => {
                let verdict = match report.outcome {
                    DeliveryOutcome::Delivered => {
                        delivered += 1;
                        "delivered"
                    }
                    DeliveryOutcome::Exhausted => "dropped",
                };
                println!(
                    "{} {} {verdict} after {} attempt(s)",
                    report.request_id, report.action, report.attempts
                );
            }
            Ok(None) => break,
            Err(_) => {
                eprintln!("gave up waiting for delivery reports");
                break;
            }
        }
    }
    delivered
}

fn parse_json_arg(raw: &str) -> Result<Value> {
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        // Bare words are taken as strings so `--value loud` works without quoting.
        Err(_) if !raw.trim().is_empty() => Ok(Value::String(raw.to_string())),
        Err(err) => bail!("invalid JSON argument '{raw}': {err}"),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn every_subcommand_has_help_text() {
        let cli = Cli::command();
        cli.clone().debug_assert();
        for sub in cli.get_subcommands() {
            assert!(
                sub.get_about().is_some(),
                "subcommand '{}' has no help text",
                sub.get_name()
            );
        }
    }
}
