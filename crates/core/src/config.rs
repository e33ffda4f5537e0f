use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// Split a comma separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub schedule: ScheduleConfig,
    pub telemetry: TelemetryConfig,
    pub smtp: SmtpConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LOGGERWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("LOGGERWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            schedule: ScheduleConfig::from_env_profiled(p),
            telemetry: TelemetryConfig::from_env_profiled(p),
            smtp: SmtpConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:     {}:{}", self.server.host, self.server.port);
        tracing::info!("  storage:    alarms_file={}", self.storage.alarms_file.display());
        tracing::info!(
            "  schedule:   check_times=[{}], stale_after={}h, notify_on_no_data={}, restarts={}x{}s",
            self.schedule.check_times.join(", "),
            self.schedule.stale_after_hours,
            self.schedule.notify_on_no_data,
            self.schedule.max_restarts,
            self.schedule.restart_delay_secs
        );
        tracing::info!(
            "  telemetry:  base_url={}, timeout={}s",
            self.telemetry.base_url.as_deref().unwrap_or("(none)"),
            self.telemetry.timeout_secs
        );
        tracing::info!(
            "  smtp:       host={}:{}, sender={}",
            self.smtp.host,
            self.smtp.port,
            self.smtp.sender.as_deref().unwrap_or("(none)")
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 8000),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Durable mirror of the alarm registry.
    pub alarms_file: PathBuf,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "DATA_DIR", "data"));
        let alarms_file = profiled_env_opt(p, "ALARMS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("alarms.json"));
        Self {
            data_dir,
            alarms_file,
        }
    }
}

// ── Schedule ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Daily wall-clock check times, "HH:MM" in the process-local time zone.
    pub check_times: Vec<String>,
    pub stale_after_hours: u32,
    pub notify_on_no_data: bool,
    /// Restarts of a failed monitor loop before the process gives up.
    pub max_restarts: u32,
    pub restart_delay_secs: u32,
}

impl ScheduleConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            check_times: split_list(&profiled_env_or(p, "CHECK_TIMES", "06:30,14:30,22:30")),
            stale_after_hours: profiled_env_u32(p, "STALE_AFTER_HOURS", 24),
            notify_on_no_data: profiled_env_bool(p, "NOTIFY_ON_NO_DATA", false),
            max_restarts: profiled_env_u32(p, "MONITOR_MAX_RESTARTS", 5),
            restart_delay_secs: profiled_env_u32(p, "MONITOR_RESTART_DELAY", 60),
        }
    }
}

// ── Telemetry (datalogger vendor API) ─────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub base_url: Option<String>,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u32,
    /// How far back the latest-reading query looks.
    pub lookback_days: u32,
}

impl TelemetryConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_opt(p, "BASE_URL"),
            api_key: profiled_env_opt(p, "API_KEY"),
            timeout_secs: profiled_env_u32(p, "TELEMETRY_TIMEOUT_SECS", 30),
            lookback_days: profiled_env_u32(p, "TELEMETRY_LOOKBACK_DAYS", 8),
        }
    }
}

// ── SMTP ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    /// Sender address, also the SMTP login.
    pub sender: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl SmtpConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "SMTP_HOST", "smtp.gmail.com"),
            port: profiled_env_u16(p, "SMTP_PORT", 587),
            tls: profiled_env_bool(p, "SMTP_TLS", true),
            sender: profiled_env_opt(p, "SENDER_EMAIL"),
            password: profiled_env_opt(p, "SENDER_PASSWORD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" 14:30, 18:30 ,,22:30 "),
            vec!["14:30", "18:30", "22:30"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn profiled_key_takes_precedence() {
        env::set_var("LWTESTA_CHECK_TIMES", "01:00,02:00");
        let schedule = ScheduleConfig::from_env_profiled("LWTESTA");
        assert_eq!(schedule.check_times, vec!["01:00", "02:00"]);
        env::remove_var("LWTESTA_CHECK_TIMES");
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        env::set_var("LWTESTB_NOTIFY_ON_NO_DATA", "Yes");
        assert!(profiled_env_bool("LWTESTB", "NOTIFY_ON_NO_DATA", false));
        env::set_var("LWTESTB_NOTIFY_ON_NO_DATA", "off");
        assert!(!profiled_env_bool("LWTESTB", "NOTIFY_ON_NO_DATA", true));
        env::remove_var("LWTESTB_NOTIFY_ON_NO_DATA");
    }

    #[test]
    fn alarms_file_defaults_under_data_dir() {
        env::set_var("LWTESTC_DATA_DIR", "/var/lib/lw");
        let storage = StorageConfig::from_env_profiled("LWTESTC");
        assert_eq!(storage.alarms_file, PathBuf::from("/var/lib/lw/alarms.json"));
        env::remove_var("LWTESTC_DATA_DIR");
    }
}
