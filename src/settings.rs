//! Bridge configuration (SPEC_FULL.md §6 addition). A typed settings
//! struct built with `serde`, the way the teacher's renderer reads its
//! own settings, rather than a loose key/value map.

use serde::{Deserialize, Serialize};

use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionKind {
    Local,
    Remote,
    Void,
}

impl Default for ConnectionKind {
    fn default() -> Self {
        ConnectionKind::Local
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub fn to_log_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Top-level bridge configuration. Constructible from a TOML/JSON file via
/// `serde`, or programmatically with [`BridgeSettings::default`] plus
/// direct field assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub connection_kind: ConnectionKind,
    pub working_dir: String,
    pub host: Option<String>,
    pub create_new_session: bool,
    pub value_clip_retiming: bool,
    pub time_clip_stages: bool,
    pub use_point_instancer: bool,
    pub write_materials: bool,
    pub log_level: LogLevel,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            connection_kind: ConnectionKind::default(),
            working_dir: ".".into(),
            host: None,
            create_new_session: true,
            value_clip_retiming: true,
            time_clip_stages: true,
            use_point_instancer: false,
            write_materials: true,
            log_level: LogLevel::default(),
        }
    }
}

impl BridgeSettings {
    /// Parses settings from a JSON config file's already-read contents.
    /// A dedicated method (rather than inlining `serde_json::from_str` at
    /// call sites) keeps the error wrapped in [`crate::errors::BridgeError`].
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_favor_local_connection_with_retiming_on() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.connection_kind, ConnectionKind::Local);
        assert!(settings.value_clip_retiming);
    }

    #[test]
    fn partial_json_overrides_fall_back_to_defaults() {
        let settings = BridgeSettings::from_json(r#"{"working_dir": "/tmp/out"}"#).unwrap();
        assert_eq!(settings.working_dir, "/tmp/out");
        assert_eq!(settings.connection_kind, ConnectionKind::Local);
    }

    #[test]
    fn round_trips_through_json() {
        let mut settings = BridgeSettings::default();
        settings.connection_kind = ConnectionKind::Remote;
        settings.host = Some("store.example".into());
        let json = settings.to_json();
        let parsed = BridgeSettings::from_json(&json).unwrap();
        assert_eq!(parsed.connection_kind, ConnectionKind::Remote);
        assert_eq!(parsed.host.as_deref(), Some("store.example"));
    }
}
