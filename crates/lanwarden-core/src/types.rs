//! Core domain types for the lanwarden presence monitor.
//!
//! These types flow between the scan adapter, change detector, registry,
//! and alert dispatcher. The registry's on-disk line format lives here as
//! well, next to the record it encodes.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ── Identity ──────────────────────────────────────────────────────

/// The key used to decide "same device" across scans.
///
/// Identity is the IP+MAC *pair*: an IP that reappears with a different
/// hardware address is a distinct identity, so DHCP churn and address
/// spoofing surface as new devices instead of silently rebinding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub ip: IpAddr,
    /// Uppercase colon-separated hardware address. Empty when the sweep
    /// could not read one; an IP-only identity is still valid.
    pub mac: String,
}

impl DeviceIdentity {
    /// Build an identity, normalizing the MAC to uppercase.
    pub fn new(ip: IpAddr, mac: &str) -> Self {
        Self {
            ip,
            mac: mac.trim().to_ascii_uppercase(),
        }
    }

    /// Whether the sweep produced a hardware address for this identity.
    pub fn has_mac(&self) -> bool {
        !self.mac.is_empty()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mac.is_empty() {
            write!(f, "{}", self.ip)
        } else {
            write!(f, "{} [{}]", self.ip, self.mac)
        }
    }
}

// ── Registry records ──────────────────────────────────────────────

/// A registry entry: one observed device and when it was seen.
///
/// Created the first time an identity appears in a scan; `last_seen`
/// moves forward on every scan in which the identity reappears. Records
/// are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRecord {
    pub identity: DeviceIdentity,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl DeviceRecord {
    /// A record for an identity observed now for the first time.
    pub fn first_observed(identity: DeviceIdentity, at: DateTime<Utc>) -> Self {
        Self {
            identity,
            first_seen: at,
            last_seen: at,
        }
    }

    /// Encode as one registry-file line: `ip,mac,first_seen,last_seen`
    /// with RFC 3339 timestamps.
    pub fn to_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.identity.ip,
            self.identity.mac,
            self.first_seen.to_rfc3339(),
            self.last_seen.to_rfc3339(),
        )
    }

    /// Decode a registry-file line.
    ///
    /// Accepts the full four-field form and the historical two-field
    /// `ip,mac` form, in which case both timestamps default to
    /// `fallback_seen` (the load time).
    pub fn from_line(line: &str, fallback_seen: DateTime<Utc>) -> Result<Self, ParseRecordError> {
        let fields: Vec<&str> = line.trim().split(',').collect();
        match fields.as_slice() {
            [ip, mac] => {
                let identity = DeviceIdentity::new(parse_ip(ip)?, mac);
                Ok(Self {
                    identity,
                    first_seen: fallback_seen,
                    last_seen: fallback_seen,
                })
            }
            [ip, mac, first, last] => Ok(Self {
                identity: DeviceIdentity::new(parse_ip(ip)?, mac),
                first_seen: parse_timestamp(first)?,
                last_seen: parse_timestamp(last)?,
            }),
            _ => Err(ParseRecordError::FieldCount {
                found: fields.len(),
            }),
        }
    }
}

fn parse_ip(field: &str) -> Result<IpAddr, ParseRecordError> {
    field
        .trim()
        .parse()
        .map_err(|_| ParseRecordError::InvalidIp {
            field: field.to_string(),
        })
}

fn parse_timestamp(field: &str) -> Result<DateTime<Utc>, ParseRecordError> {
    DateTime::parse_from_rfc3339(field.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ParseRecordError::InvalidTimestamp {
            field: field.to_string(),
        })
}

/// Errors decoding a registry-file line.
#[derive(Debug, Error)]
pub enum ParseRecordError {
    #[error("Expected 2 or 4 comma-separated fields, found {found}")]
    FieldCount { found: usize },

    #[error("Invalid IP address: {field}")]
    InvalidIp { field: String },

    #[error("Invalid RFC 3339 timestamp: {field}")]
    InvalidTimestamp { field: String },
}

// ── Scan results ──────────────────────────────────────────────────

/// One sweep's observations, in the order the tool reported them.
///
/// Ephemeral: lives for the duration of a single cycle.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Unique ID for this sweep run, for log correlation.
    pub scan_id: Uuid,
    /// When the sweep was started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the sweep.
    pub duration: Duration,
    /// Identities observed, in output order. May contain duplicates if
    /// the tool repeats a host; the change detector deduplicates.
    pub identities: Vec<DeviceIdentity>,
}

// ── Alerts ────────────────────────────────────────────────────────

/// A pending notification for a newly observed device.
///
/// Created once per identity present in a scan but absent from the
/// registry at cycle start; consumed exactly once by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertEvent {
    pub identity: DeviceIdentity,
    pub detected_at: DateTime<Utc>,
    pub message: String,
}

impl AlertEvent {
    /// Build the event for a newly observed identity.
    pub fn new_device(identity: DeviceIdentity, detected_at: DateTime<Utc>) -> Self {
        let message = if identity.has_mac() {
            format!(
                "New device on network: {} (MAC {}) first seen {}",
                identity.ip,
                identity.mac,
                detected_at.to_rfc3339(),
            )
        } else {
            format!(
                "New device on network: {} (no MAC reported) first seen {}",
                identity.ip,
                detected_at.to_rfc3339(),
            )
        };
        Self {
            identity,
            detected_at,
            message,
        }
    }
}
