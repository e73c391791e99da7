//! Configuration schema definitions.
//!
//! ```toml
//! [logging]
//! level = "info"
//! format = "compact"
//!
//! [rights]
//! default_allow = true
//! permissions = { function_Roll = true }
//!
//! [modules]
//! enabled = ["dice", "greeter"]
//! data_dir = "/var/lib/hallo"
//! config.dice = { sides = 6 }
//!
//! [user_groups.god]
//! function_Reload = true
//!
//! [[servers]]
//! name = "libera"
//! nick = "hallo"
//! prefix = "!"
//!
//! [[servers.channels]]
//! name = "#hallo"
//! auto_join = true
//! passive_enabled = false
//!
//! [[servers.users]]
//! name = "dr-spangle"
//! groups = ["god"]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use hallo_core::{CommandPrefix, PermissionMask};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HalloConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Process-wide rights.
    #[serde(default)]
    pub rights: RightsConfig,

    #[serde(default)]
    pub modules: ModulesConfig,

    /// User groups by name, each with its permission mask.
    #[serde(default)]
    pub user_groups: BTreeMap<String, BTreeMap<String, bool>>,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl HalloConfig {
    /// Configuration of the server called `name`.
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Needs the `json-log` feature; falls back to `Full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Rotated files to keep. `0` keeps all of them.
    #[serde(default = "default_max_files")]
    pub max_files: u32,

    /// Per-target levels, e.g. `hallo_framework = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of the log statement.
    #[serde(default)]
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            filters: BTreeMap::new(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
        }
    }
}

fn default_max_files() -> u32 {
    5
}

// =============================================================================
// Rights and modules
// =============================================================================

/// Process-wide rights: the fallback for every rights check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RightsConfig {
    /// Answer for rights nobody set.
    #[serde(default = "default_true")]
    pub default_allow: bool,

    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl Default for RightsConfig {
    fn default() -> Self {
        Self {
            default_allow: true,
            permissions: BTreeMap::new(),
        }
    }
}

/// Module loading settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Modules allowed to load. Empty allows every compiled-in module.
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Where persistent functions keep state. Defaults to the user data
    /// directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Per-module config sections, handed to load hooks.
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl ModulesConfig {
    /// The configured data directory, else `<user data dir>/hallo`.
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|dir| dir.join("hallo")))
    }
}

// =============================================================================
// Servers
// =============================================================================

/// One chat server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,

    #[serde(default = "default_nick")]
    pub nick: String,

    /// Literal command prefix. Unset means the bot's nickname.
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,

    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    #[serde(default)]
    pub users: Vec<UserConfig>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nick: default_nick(),
            prefix: None,
            permissions: BTreeMap::new(),
            channels: Vec::new(),
            users: Vec::new(),
        }
    }

    pub fn command_prefix(&self) -> CommandPrefix {
        CommandPrefix::from(self.prefix.clone())
    }

    pub fn permission_mask(&self) -> PermissionMask {
        mask(&self.permissions)
    }
}

/// A channel known before the server connects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,

    #[serde(default)]
    pub auto_join: bool,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_true")]
    pub logging: bool,

    #[serde(default)]
    pub uppercase: bool,

    #[serde(default = "default_true")]
    pub passive_enabled: bool,

    /// Literal prefix for this channel only. Unset inherits the server's.
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto_join: false,
            password: None,
            logging: true,
            uppercase: false,
            passive_enabled: true,
            prefix: None,
            permissions: BTreeMap::new(),
        }
    }

    pub fn permission_mask(&self) -> PermissionMask {
        mask(&self.permissions)
    }
}

/// A user known before the server connects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub name: String,

    /// Names of the user groups the user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,

    #[serde(default)]
    pub permissions: BTreeMap<String, bool>,
}

impl UserConfig {
    pub fn permission_mask(&self) -> PermissionMask {
        mask(&self.permissions)
    }
}

pub(crate) fn mask(rights: &BTreeMap<String, bool>) -> PermissionMask {
    rights
        .iter()
        .map(|(right, allowed)| (right.clone(), *allowed))
        .collect()
}

fn default_nick() -> String {
    "hallo".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: HalloConfig = serde_json::from_str("{}").unwrap();
        assert!(config.rights.default_allow);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.servers.is_empty());
    }

    #[test]
    fn test_server_section() {
        let config: HalloConfig = serde_json::from_value(serde_json::json!({
            "servers": [{
                "name": "libera",
                "prefix": "!",
                "permissions": { "function_Roll": false },
                "channels": [{ "name": "#hallo", "passive_enabled": false }]
            }]
        }))
        .unwrap();

        let server = config.server("libera").unwrap();
        assert_eq!(server.nick, "hallo");
        assert_eq!(server.command_prefix(), CommandPrefix::literal("!"));
        assert_eq!(server.permission_mask().get_right("function_Roll"), Some(false));
        let channel = &server.channels[0];
        assert!(channel.logging);
        assert!(!channel.passive_enabled);
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let result: Result<LoggingConfig, _> =
            serde_json::from_value(serde_json::json!({ "level": "loud" }));
        assert!(result.is_err());
    }
}
