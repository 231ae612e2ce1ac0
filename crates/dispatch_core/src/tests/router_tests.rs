use super::*;
use crate::{
    dispatcher::{DeliveryOutcome, DeliveryReport, DispatchConfig},
    transport::AgentTransport,
};
use serde_json::json;
use shared::protocol::AgentCommand;
use storage::NewAction;
use tokio::sync::{mpsc, Mutex};

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<AgentCommand>>,
}

#[async_trait]
impl AgentTransport for RecordingTransport {
    async fn send(&self, command: &AgentCommand) -> bool {
        self.sent.lock().await.push(command.clone());
        true
    }

    async fn health_check(&self) -> bool {
        true
    }
}

struct Harness {
    storage: Storage,
    transport: Arc<RecordingTransport>,
    dispatcher: Arc<Dispatcher>,
    router: TriggerRouter,
    reports: mpsc::UnboundedReceiver<DeliveryReport>,
}

async fn harness() -> Harness {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.insert_seed_data().await.expect("seed");
    let transport = Arc::new(RecordingTransport::default());
    let (tx, reports) = mpsc::unbounded_channel();
    let dispatcher = Arc::new(Dispatcher::start_with_reports(
        transport.clone(),
        DispatchConfig::default(),
        Some(tx),
    ));
    let router = TriggerRouter::new(Arc::new(storage.clone()), Arc::clone(&dispatcher));
    Harness {
        storage,
        transport,
        dispatcher,
        router,
        reports,
    }
}

#[tokio::test]
async fn slider_release_sends_resolved_volume() {
    let mut h = harness().await;

    let outcome = h
        .router
        .fire(
            ControlId(3),
            &Trigger::ValueRelease,
            Some(&DispatchContext::with_value(7)),
        )
        .await
        .expect("fire");
    assert_eq!(outcome.queued.len(), 1);
    assert!(outcome.local.is_empty());

    let report = h.reports.recv().await.expect("report");
    assert_eq!(report.outcome, DeliveryOutcome::Delivered);
    assert_eq!(report.request_id, outcome.queued[0]);

    let sent = h.transport.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].action(), "run_app");
    assert_eq!(
        sent[0].payload(),
        &json!({"app": "your_app", "args": ["--volume", 7], "value": 7})
    );
    drop(sent);
    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn toggle_only_fires_matching_trigger() {
    let mut h = harness().await;

    let outcome = h
        .router
        .fire(
            ControlId(2),
            &Trigger::for_toggle(false),
            Some(&DispatchContext::with_state(false)),
        )
        .await
        .expect("fire");
    assert_eq!(outcome.queued.len(), 1);
    h.reports.recv().await.expect("report");

    let sent = h.transport.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload(), &json!({"keys": ["ctrl", "s"]}));
    drop(sent);
    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn navigation_and_resolution_stay_local() {
    let h = harness().await;

    let settings = h
        .router
        .fire(ControlId(4), &Trigger::Press, None)
        .await
        .expect("fire settings");
    let back = h
        .router
        .fire(ControlId(9), &Trigger::Press, None)
        .await
        .expect("fire back");
    let info = h
        .router
        .fire(ControlId(17), &Trigger::Press, None)
        .await
        .expect("fire info");

    assert_eq!(settings.local, vec![LocalAction::NavigateScreen(ScreenId(3))]);
    assert_eq!(back.local, vec![LocalAction::NavigateScreen(ScreenId(1))]);
    assert_eq!(info.local, vec![LocalAction::ShowResolution]);
    assert!(settings.queued.is_empty() && back.queued.is_empty() && info.queued.is_empty());

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(h.transport.sent.lock().await.is_empty());
    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn broken_action_is_rejected_without_blocking_siblings() {
    let mut h = harness().await;
    let broken = h
        .storage
        .insert_action(&NewAction {
            control_id: ControlId(1),
            trigger: Trigger::Press,
            action_type: ActionType::RunApp,
            payload_json: r#"{"action":"run_app"}"#.into(),
            value_key: None,
        })
        .await
        .expect("insert");

    let outcome = h
        .router
        .fire(ControlId(1), &Trigger::Press, None)
        .await
        .expect("fire");

    assert_eq!(outcome.queued.len(), 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].0, broken);
    assert!(matches!(
        outcome.rejected[0].1,
        MappingError::InvalidAction { .. }
    ));

    h.reports.recv().await.expect("report");
    assert_eq!(h.transport.sent.lock().await.len(), 1);
    h.dispatcher.shutdown().await;
}

#[tokio::test]
async fn unknown_control_fires_nothing() {
    let h = harness().await;

    let outcome = h
        .router
        .fire(ControlId(999), &Trigger::Press, None)
        .await
        .expect("fire");

    assert!(outcome.queued.is_empty());
    assert!(outcome.local.is_empty());
    assert!(outcome.rejected.is_empty());
    h.dispatcher.shutdown().await;
}
