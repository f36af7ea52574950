use serde::{Deserialize, Serialize};

/// Logging configuration for [`crate::infrastructure::logging::init_logging`].
///
/// Hosts embedding the engine typically deserialize this from their own
/// configuration; all fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// "trace", "debug", "info", "warn" or "error". Overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    /// "daily", "hourly", "minutely" or "never".
    #[serde(default = "default_rotation")]
    pub rotation: String,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            rotation: default_rotation(),
            ansi_colors: default_true(),
            show_target: default_true(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "bandlink".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}
