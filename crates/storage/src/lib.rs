use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::info;

use shared::domain::{ActionDefinition, ActionId, ActionType, ControlId, ScreenId, Trigger};

pub const SETTING_AGENT_HOST: &str = "agent_host";
pub const SETTING_AGENT_PORT: &str = "agent_port";
pub const SETTING_AGENT_TOKEN: &str = "agent_token";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredSetting {
    pub key: String,
    pub value: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAction {
    pub control_id: ControlId,
    pub trigger: Trigger,
    pub action_type: ActionType,
    pub payload_json: String,
    pub value_key: Option<String>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Every connection to `sqlite::memory:` is its own database, so pin a single one.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run panel schema migrations")?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<StoredSetting>> {
        let row = sqlx::query("SELECT key, value, updated_at FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read setting '{key}'"))?;
        row.map(|row| {
            Ok(StoredSetting {
                key: row.try_get("key")?,
                value: row.try_get("value")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    /// Value of a setting, treating a missing row, NULL and empty text alike.
    pub async fn setting_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .get_setting(key)
            .await?
            .and_then(|setting| setting.value)
            .filter(|value| !value.is_empty()))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write setting '{key}'"))?;
        Ok(())
    }

    pub async fn list_actions_for_control(
        &self,
        control_id: ControlId,
    ) -> Result<Vec<ActionDefinition>> {
        let rows = sqlx::query(
            "SELECT id, control_id, trigger, action_type, payload_json, value_key
             FROM actions
             WHERE control_id = ?
             ORDER BY id ASC",
        )
        .bind(control_id.0)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list actions for control {}", control_id.0))?;

        rows.iter().map(action_from_row).collect()
    }

    pub async fn insert_action(&self, action: &NewAction) -> Result<ActionId> {
        let rec = sqlx::query(
            "INSERT INTO actions (control_id, trigger, action_type, payload_json, value_key)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(action.control_id.0)
        .bind(action.trigger.as_str())
        .bind(action.action_type.as_str())
        .bind(&action.payload_json)
        .bind(action.value_key.as_deref())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert action for control {}", action.control_id.0))?;
        Ok(ActionId(rec.get::<i64, _>(0)))
    }

    pub async fn insert_screen(&self, name: &str, order_index: i64) -> Result<ScreenId> {
        let rec = sqlx::query("INSERT INTO screens (name, order_index) VALUES (?, ?) RETURNING id")
            .bind(name)
            .bind(order_index)
            .fetch_one(&self.pool)
            .await?;
        Ok(ScreenId(rec.get::<i64, _>(0)))
    }

    pub async fn insert_control(
        &self,
        screen_id: ScreenId,
        control_type: &str,
        label: &str,
    ) -> Result<ControlId> {
        let rec = sqlx::query(
            "INSERT INTO controls (screen_id, type, label) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(screen_id.0)
        .bind(control_type)
        .bind(label)
        .fetch_one(&self.pool)
        .await?;
        Ok(ControlId(rec.get::<i64, _>(0)))
    }

    /// Loads the stock panel layout. Does nothing once any screen exists.
    pub async fn insert_seed_data(&self) -> Result<bool> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM screens")
            .fetch_one(&self.pool)
            .await?;
        if existing > 0 {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;
        for statement in SEED_STATEMENTS {
            sqlx::query(*statement)
                .execute(&mut *tx)
                .await
                .context("failed to apply seed data")?;
        }
        tx.commit().await?;
        info!("seeded panel layout");
        Ok(true)
    }
}

fn action_from_row(row: &SqliteRow) -> Result<ActionDefinition> {
    Ok(ActionDefinition {
        id: ActionId(row.try_get("id")?),
        control_id: ControlId(row.try_get("control_id")?),
        trigger: Trigger::from(row.try_get::<String, _>("trigger")?),
        action_type: ActionType::from(row.try_get::<String, _>("action_type")?),
        payload_template: row.try_get("payload_json")?,
        value_key: row.try_get("value_key")?,
    })
}

const SEED_STATEMENTS: &[&str] = &[
    "INSERT INTO screens (id, name, order_index, bg_color) VALUES
        (1, 'Main', 1, '#101820'),
        (2, 'Apps', 2, '#1b1b1b'),
        (3, 'Settings', 3, '#0f172a')",
    "INSERT INTO controls (id, screen_id, type, label, setting_key) VALUES
        (1, 1, 'button', 'Open Notepad', NULL),
        (2, 1, 'toggle', 'Caps Lock', NULL),
        (3, 2, 'slider', 'Volume', NULL),
        (4, 1, 'button', 'Settings', NULL),
        (5, 3, 'setting_text', 'Agent Host', 'agent_host'),
        (6, 3, 'setting_text', 'Agent Port', 'agent_port'),
        (7, 3, 'setting_text', 'Agent Token', 'agent_token'),
        (9, 3, 'button', 'Back', NULL),
        (17, 1, 'button', 'Info', NULL)",
    r#"INSERT INTO actions (id, control_id, trigger, action_type, payload_json, value_key) VALUES
        (1, 1, 'press', 'run_app', '{"action":"run_app","payload":{"app":"notepad"}}', NULL),
        (2, 2, 'toggle_on', 'key_press', '{"action":"key_press","payload":{"keys":["ctrl","shift","s"]}}', NULL),
        (3, 2, 'toggle_off', 'key_press', '{"action":"key_press","payload":{"keys":["ctrl","s"]}}', NULL),
        (4, 3, 'value_release', 'run_app', '{"action":"run_app","payload":{"app":"your_app","args":["--volume","${value}"]}}', 'value'),
        (5, 4, 'press', 'navigate_screen', '{"screen_id":3}', NULL),
        (6, 9, 'press', 'navigate_screen', '{"screen_id":1}', NULL),
        (7, 17, 'press', 'show_resolution', '{"action":"show_resolution","payload":{}}', NULL)"#,
    "INSERT INTO settings (key, value) VALUES
        ('agent_host', '127.0.0.1'),
        ('agent_port', '8765'),
        ('agent_token', '')",
];

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
