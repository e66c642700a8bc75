use std::{collections::HashMap, fs, time::Duration};

use shared::domain::DEFAULT_PORT;
use tracing::warn;

pub const SETTINGS_FILE: &str = "transfer.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub notification_ttl: Duration,
    pub completion_delay: Duration,
    pub default_port: String,
    pub command_queue: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notification_ttl: Duration::from_millis(5000),
            completion_delay: Duration::from_millis(2000),
            default_port: DEFAULT_PORT.into(),
            command_queue: 64,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, String>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!("ignoring unreadable {SETTINGS_FILE}: {err}");
            return;
        }
    };

    if let Some(v) = file_cfg.get("notification_ttl_ms").and_then(|v| parse_millis(v)) {
        settings.notification_ttl = v;
    }
    if let Some(v) = file_cfg.get("completion_delay_ms").and_then(|v| parse_millis(v)) {
        settings.completion_delay = v;
    }
    if let Some(v) = file_cfg.get("default_port") {
        settings.default_port = v.clone();
    }
    if let Some(v) = file_cfg.get("command_queue").and_then(|v| v.parse().ok()) {
        settings.command_queue = v;
    }
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("APP__NOTIFICATION_TTL_MS").and_then(|v| parse_millis(&v)) {
        settings.notification_ttl = v;
    }
    if let Some(v) = lookup("APP__COMPLETION_DELAY_MS").and_then(|v| parse_millis(&v)) {
        settings.completion_delay = v;
    }
    if let Some(v) = lookup("APP__DEFAULT_PORT") {
        settings.default_port = v;
    }
    if let Some(v) = lookup("APP__COMMAND_QUEUE").and_then(|v| v.parse::<usize>().ok()) {
        if v > 0 {
            settings.command_queue = v;
        }
    }
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_millis)
}
