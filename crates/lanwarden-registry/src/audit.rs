//! Append-only audit log of first observations.
//!
//! One tab-separated line per newly observed identity
//! (`timestamp<TAB>ip<TAB>mac`), flushed as it is written. The file
//! exists for human review; the monitor never reads it back, and it is
//! independent of the registry.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use lanwarden_core::DeviceIdentity;

use crate::store::StoreError;

pub struct AuditLog {
    path: PathBuf,
    file: File,
}

impl AuditLog {
    /// Open (or create) the audit log for appending.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(StoreError::Io)?;
        Ok(Self { path, file })
    }

    /// Append one detection entry and flush it to disk.
    pub fn record(
        &mut self,
        identity: &DeviceIdentity,
        detected_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        writeln!(
            self.file,
            "{}\t{}\t{}",
            detected_at.to_rfc3339(),
            identity.ip,
            identity.mac,
        )?;
        self.file.flush()?;

        tracing::debug!(
            path = %self.path.display(),
            device = %identity,
            "Audit entry recorded"
        );
        Ok(())
    }
}
