use std::{collections::HashMap, fs, path::Path, time::Duration};

use dispatch_core::DispatchConfig;

pub const CONFIG_FILE: &str = "panel.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSettings {
    pub database_url: String,
    pub log_filter: String,
    pub health_interval_ms: u64,
    pub send_timeout_ms: u64,
    pub health_timeout_ms: u64,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/panel.db".into(),
            log_filter: "info".into(),
            health_interval_ms: 2000,
            send_timeout_ms: 2000,
            health_timeout_ms: 1000,
        }
    }
}

impl PanelSettings {
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            health_interval: Duration::from_millis(self.health_interval_ms),
            ..DispatchConfig::default()
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_millis(self.health_timeout_ms)
    }
}

/// Defaults, then `panel.toml`, then environment variables. Rejected values
/// are returned as warnings because the log filter itself comes from here.
pub fn load_settings() -> (PanelSettings, Vec<String>) {
    let mut settings = PanelSettings::default();
    let mut warnings = Vec::new();
    apply_file(&mut settings, Path::new(CONFIG_FILE), &mut warnings);
    apply_env(&mut settings, |key| std::env::var(key).ok(), &mut warnings);
    (settings, warnings)
}

fn apply_file(settings: &mut PanelSettings, path: &Path, warnings: &mut Vec<String>) {
    let Ok(raw) = fs::read_to_string(path) else {
        return;
    };
    match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
        Ok(file_cfg) => {
            let lookup = |key: &str| {
                file_cfg.get(key).map(|value| match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            };
            apply_values(settings, lookup, &[
                ("database_url", Field::DatabaseUrl),
                ("log_filter", Field::LogFilter),
                ("health_interval_ms", Field::HealthInterval),
                ("send_timeout_ms", Field::SendTimeout),
                ("health_timeout_ms", Field::HealthTimeout),
            ], warnings);
        }
        Err(err) => warnings.push(format!("ignoring {}: {err}", path.display())),
    }
}

fn apply_env(
    settings: &mut PanelSettings,
    lookup: impl Fn(&str) -> Option<String>,
    warnings: &mut Vec<String>,
) {
    apply_values(settings, lookup, &[
        ("DATABASE_URL", Field::DatabaseUrl),
        ("APP__DATABASE_URL", Field::DatabaseUrl),
        ("APP__LOG_FILTER", Field::LogFilter),
        ("APP__HEALTH_INTERVAL_MS", Field::HealthInterval),
        ("APP__SEND_TIMEOUT_MS", Field::SendTimeout),
        ("APP__HEALTH_TIMEOUT_MS", Field::HealthTimeout),
    ], warnings);
}

#[derive(Clone, Copy)]
enum Field {
    DatabaseUrl,
    LogFilter,
    HealthInterval,
    SendTimeout,
    HealthTimeout,
}

fn apply_values(
    settings: &mut PanelSettings,
    lookup: impl Fn(&str) -> Option<String>,
    keys: &[(&str, Field)],
    warnings: &mut Vec<String>,
) {
    for (key, field) in keys {
        let Some(value) = lookup(key) else {
            continue;
        };
        match field {
            Field::DatabaseUrl => settings.database_url = value,
            Field::LogFilter => settings.log_filter = value,
            Field::HealthInterval => set_millis(&mut settings.health_interval_ms, key, &value, warnings),
            Field::SendTimeout => set_millis(&mut settings.send_timeout_ms, key, &value, warnings),
            Field::HealthTimeout => set_millis(&mut settings.health_timeout_ms, key, &value, warnings),
        }
    }
}

fn set_millis(slot: &mut u64, key: &str, value: &str, warnings: &mut Vec<String>) {
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => *slot = parsed,
        _ => warnings.push(format!(
            "ignoring {key}={value}: expected a positive number of milliseconds"
        )),
    }
}
