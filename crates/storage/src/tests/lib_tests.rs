use super::*;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("panel_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("panel.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn settings_upsert_and_read_back() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.get_setting("agent_host").await.expect("read").is_none());

    storage
        .set_setting("agent_host", "10.0.0.5")
        .await
        .expect("insert");
    storage
        .set_setting("agent_host", "10.0.0.6")
        .await
        .expect("update");

    let setting = storage
        .get_setting("agent_host")
        .await
        .expect("read")
        .expect("present");
    assert_eq!(setting.value.as_deref(), Some("10.0.0.6"));
    assert!(setting.updated_at.is_some());
}

#[tokio::test]
async fn empty_setting_value_reads_as_unset() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set_setting("agent_token", "").await.expect("write");
    assert_eq!(storage.setting_value("agent_token").await.expect("read"), None);
}

#[tokio::test]
async fn seed_is_idempotent_and_loads_actions() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert!(storage.insert_seed_data().await.expect("seed"));
    assert!(!storage.insert_seed_data().await.expect("reseed"));

    let toggle_actions = storage
        .list_actions_for_control(ControlId(2))
        .await
        .expect("actions");
    assert_eq!(toggle_actions.len(), 2);
    assert_eq!(toggle_actions[0].trigger, Trigger::ToggleOn);
    assert_eq!(toggle_actions[1].trigger, Trigger::ToggleOff);
    assert_eq!(toggle_actions[0].action_type, ActionType::KeyPress);

    let slider_actions = storage
        .list_actions_for_control(ControlId(3))
        .await
        .expect("actions");
    assert_eq!(slider_actions.len(), 1);
    assert_eq!(slider_actions[0].value_key.as_deref(), Some("value"));
    assert!(slider_actions[0].payload_template.contains("${value}"));

    assert_eq!(
        storage.setting_value(SETTING_AGENT_PORT).await.expect("port"),
        Some("8765".to_string())
    );
}

#[tokio::test]
async fn inserted_action_keeps_free_form_kinds() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let screen = storage.insert_screen("Main", 1).await.expect("screen");
    let control = storage
        .insert_control(screen, "button", "Macro")
        .await
        .expect("control");
    let action_id = storage
        .insert_action(&NewAction {
            control_id: control,
            trigger: Trigger::Other("long_press".into()),
            action_type: ActionType::Other("macro".into()),
            payload_json: r#"{"action":"macro","payload":{"name":"build"}}"#.into(),
            value_key: None,
        })
        .await
        .expect("action");

    let actions = storage
        .list_actions_for_control(control)
        .await
        .expect("list");
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].id, action_id);
    assert_eq!(actions[0].trigger.as_str(), "long_press");
    assert_eq!(actions[0].action_type, ActionType::Other("macro".into()));
}

#[test]
fn memory_urls_have_no_parent_dir() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/panel.db?mode=rwc"),
        Some(PathBuf::from("./data/panel.db"))
    );
}
