//! Configuration for the lanwarden presence monitor.

use std::time::Duration;

use serde::Deserialize;

/// Top-level monitor configuration.
///
/// Loaded from `lanwarden.toml` `[monitor]` section or
/// `LANWARDEN__MONITOR__` environment variables. SMTP credentials
/// belong in the environment, not in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Path to the sweep binary (default: "nmap").
    #[serde(default = "default_sweep_path")]
    pub sweep_path: String,

    /// Subnet to watch, CIDR notation (e.g. "192.168.1.0/24").
    #[serde(default)]
    pub target: String,

    /// Seconds between cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Upper bound on one sweep invocation; a hung sweep is killed.
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout_secs: u64,

    /// Registry file: one known device per line.
    #[serde(default = "default_registry_path")]
    pub registry_path: String,

    /// Append-only detection log for human review.
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: String,

    /// Alert transport settings.
    #[serde(default)]
    pub smtp: SmtpConfig,
}

/// SMTP submission settings for the SMS-gateway alert mail.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// Relay hostname (e.g. "smtp.gmail.com").
    #[serde(default)]
    pub relay: String,

    /// Submission port; STARTTLS is negotiated on it.
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    /// Set via LANWARDEN__MONITOR__SMTP__PASSWORD.
    #[serde(default)]
    pub password: String,

    /// Sender address.
    #[serde(default)]
    pub from: String,

    /// Recipient address (a carrier's SMS-gateway alias).
    #[serde(default)]
    pub to: String,

    /// Upper bound on one send attempt.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

impl SmtpConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

fn default_sweep_path() -> String {
    "nmap".to_string()
}

fn default_interval() -> u64 {
    300
}

fn default_scan_timeout() -> u64 {
    120
}

fn default_registry_path() -> String {
    "known_devices.txt".to_string()
}

fn default_audit_log_path() -> String {
    "new_devices.log".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_send_timeout() -> u64 {
    30
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sweep_path: default_sweep_path(),
            target: String::new(),
            interval_secs: default_interval(),
            scan_timeout_secs: default_scan_timeout(),
            registry_path: default_registry_path(),
            audit_log_path: default_audit_log_path(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            relay: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: String::new(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.sweep_path, "nmap");
        assert!(config.target.is_empty());
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.scan_timeout(), Duration::from_secs(120));
        assert_eq!(config.registry_path, "known_devices.txt");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.send_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{"target": "192.168.1.0/24", "interval_secs": 60, "smtp": {"relay": "smtp.example.com"}}"#,
        )
        .unwrap();

        assert_eq!(config.target, "192.168.1.0/24");
        assert_eq!(config.interval_secs, 60);
        assert_eq!(config.sweep_path, "nmap");
        assert_eq!(config.smtp.relay, "smtp.example.com");
        assert_eq!(config.smtp.port, 587);
    }
}
