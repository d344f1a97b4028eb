//! Alert dispatch over authenticated SMTP submission.
//!
//! Each newly observed device becomes one email to a fixed recipient
//! (typically a carrier's SMS-gateway alias). One send attempt per
//! event, bounded by a timeout; the caller logs failures and moves on,
//! and registry state stays authoritative regardless of delivery.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use lanwarden_core::AlertEvent;

use crate::config::SmtpConfig;
use crate::error::{MonitorError, NotifyError};

pub struct AlertNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    send_timeout: Duration,
}

impl AlertNotifier {
    /// Build the notifier from config: STARTTLS relay with credential
    /// authentication. Invalid addresses or a missing relay are config
    /// errors and fail startup.
    pub fn from_config(cfg: &SmtpConfig) -> Result<Self, MonitorError> {
        if cfg.relay.is_empty() {
            return Err(MonitorError::Config("smtp.relay must be set".to_string()));
        }

        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| MonitorError::Config(format!("smtp.from: {e}")))?;
        let to: Mailbox = cfg
            .to
            .parse()
            .map_err(|e| MonitorError::Config(format!("smtp.to: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.relay)
            .map_err(|e| MonitorError::Config(format!("smtp.relay: {e}")))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();

        Ok(Self {
            transport,
            from,
            to,
            send_timeout: cfg.send_timeout(),
        })
    }

    /// Send one alert. A single attempt; no retry here.
    pub async fn dispatch(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject_for(event))
            .header(ContentType::TEXT_PLAIN)
            .body(event.message.clone())?;

        match tokio::time::timeout(self.send_timeout, self.transport.send(email)).await {
            Ok(Ok(_)) => {
                tracing::info!(device = %event.identity, "Alert dispatched");
                Ok(())
            }
            Ok(Err(e)) => Err(classify_smtp_error(e)),
            Err(_) => Err(NotifyError::Timeout(self.send_timeout)),
        }
    }
}

fn subject_for(event: &AlertEvent) -> String {
    format!("lanwarden: new device {}", event.identity.ip)
}

/// A permanent negative completion at the submission hop means the relay
/// rejected us (credentials); everything else is connection trouble.
fn classify_smtp_error(source: lettre::transport::smtp::Error) -> NotifyError {
    if source.is_permanent() {
        NotifyError::AuthRejected { source }
    } else {
        NotifyError::ConnectionFailed { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lanwarden_core::DeviceIdentity;

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            relay: "smtp.example.com".to_string(),
            username: "warden@example.com".to_string(),
            password: "app-password".to_string(),
            from: "warden@example.com".to_string(),
            to: "5551234567@txt.example.com".to_string(),
            ..SmtpConfig::default()
        }
    }

    #[test]
    fn builds_from_valid_config() {
        assert!(AlertNotifier::from_config(&smtp_config()).is_ok());
    }

    #[test]
    fn rejects_missing_relay() {
        let cfg = SmtpConfig {
            relay: String::new(),
            ..smtp_config()
        };
        assert!(matches!(
            AlertNotifier::from_config(&cfg),
            Err(MonitorError::Config(_))
        ));
    }

    #[test]
    fn rejects_invalid_recipient() {
        let cfg = SmtpConfig {
            to: "not an address".to_string(),
            ..smtp_config()
        };
        assert!(matches!(
            AlertNotifier::from_config(&cfg),
            Err(MonitorError::Config(_))
        ));
    }

    #[test]
    fn subject_names_the_device() {
        let event = AlertEvent::new_device(
            DeviceIdentity::new("10.0.0.11".parse().unwrap(), "AA:BB:CC:DD:EE:03"),
            Utc::now(),
        );
        assert_eq!(subject_for(&event), "lanwarden: new device 10.0.0.11");
    }
}
