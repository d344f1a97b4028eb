//! Device registry: in-memory map with line-oriented file persistence.
//!
//! The registry file holds one record per line
//! (`ip,mac,first_seen,last_seen`, RFC 3339 timestamps; the historical
//! `ip,mac` form is still accepted). The whole file is loaded at process
//! start and rewritten atomically on flush: records are written to a
//! sibling temp file which is then renamed over the registry path, so a
//! crash mid-write never truncates the known-device set.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use lanwarden_core::{DeviceIdentity, DeviceRecord};

/// Errors that can occur during registry storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to write registry file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Registry file {path} is locked: {source}")]
    FileLocked {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn classify_write_error(path: &Path, source: io::Error) -> StoreError {
    match source.kind() {
        io::ErrorKind::WouldBlock => StoreError::FileLocked {
            path: path.to_path_buf(),
            source,
        },
        _ => StoreError::WriteFailed {
            path: path.to_path_buf(),
            source,
        },
    }
}

/// The durable set of every device ever observed.
///
/// Mutations update the in-memory map first and mark the registry dirty;
/// a failed flush leaves the map intact so a transient storage failure
/// cannot re-trigger alerts within the running process. The dirty flag
/// makes retrying cheap: the scheduler calls [`DeviceRegistry::flush`]
/// every cycle and the write is a no-op once storage has caught up.
pub struct DeviceRegistry {
    path: PathBuf,
    devices: HashMap<DeviceIdentity, DeviceRecord>,
    dirty: bool,
}

impl DeviceRegistry {
    /// Load the registry from `path`.
    ///
    /// A missing file is an empty registry, not an error. Blank lines are
    /// skipped; malformed lines are logged and skipped so one corrupt
    /// entry cannot take the monitor down at startup.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let loaded_at = Utc::now();
        let mut devices = HashMap::new();

        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match DeviceRecord::from_line(line, loaded_at) {
                Ok(record) => {
                    devices.insert(record.identity.clone(), record);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        line = line_no + 1,
                        error = %e,
                        "Skipping malformed registry line"
                    );
                }
            }
        }

        tracing::debug!(
            path = %path.display(),
            devices = devices.len(),
            "Registry loaded"
        );

        Ok(Self {
            path,
            devices,
            dirty: false,
        })
    }

    /// Whether this identity has been observed before.
    pub fn contains(&self, identity: &DeviceIdentity) -> bool {
        self.devices.contains_key(identity)
    }

    pub fn get(&self, identity: &DeviceIdentity) -> Option<&DeviceRecord> {
        self.devices.get(identity)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Read-only copy of the known identities, for diffing. The change
    /// detector works on this snapshot and never touches the registry.
    pub fn snapshot(&self) -> HashSet<DeviceIdentity> {
        self.devices.keys().cloned().collect()
    }

    /// Whether a flush is pending (an earlier write failed or in-memory
    /// state has moved since the last successful flush).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Insert or refresh a record and persist the registry.
    ///
    /// Idempotent on identity: re-upserting an already-known record only
    /// moves `last_seen` forward; `first_seen` keeps its original value.
    /// The in-memory map is updated even when the write fails, so the
    /// caller may treat a [`StoreError`] as a warning and rely on a later
    /// [`DeviceRegistry::flush`] to retry.
    pub fn upsert(&mut self, record: DeviceRecord) -> Result<(), StoreError> {
        self.devices
            .entry(record.identity.clone())
            .and_modify(|existing| existing.last_seen = record.last_seen)
            .or_insert(record);
        self.dirty = true;
        self.flush()
    }

    /// Refresh `last_seen` for an already-known identity in memory.
    ///
    /// Returns `false` if the identity is unknown. The change is picked
    /// up by the next flush; re-sighting a known device does not need
    /// its own durable write before any alert.
    pub fn touch(&mut self, identity: &DeviceIdentity, at: DateTime<Utc>) -> bool {
        match self.devices.get_mut(identity) {
            Some(record) => {
                record.last_seen = at;
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Write the full registry to disk if anything changed since the
    /// last successful flush.
    ///
    /// Records go to a sibling `.tmp` file, synced, then renamed over
    /// the registry path. Output is sorted by identity so the file stays
    /// stable and diffable across runs.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }

        let mut records: Vec<&DeviceRecord> = self.devices.values().collect();
        records.sort_by(|a, b| {
            (a.identity.ip, &a.identity.mac).cmp(&(b.identity.ip, &b.identity.mac))
        });

        let tmp_path = self.path.with_extension("tmp");
        self.write_records(&tmp_path, &records)
            .map_err(|e| classify_write_error(&self.path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| classify_write_error(&self.path, e))?;

        self.dirty = false;
        tracing::debug!(
            path = %self.path.display(),
            devices = self.devices.len(),
            "Registry flushed"
        );
        Ok(())
    }

    fn write_records(&self, tmp_path: &Path, records: &[&DeviceRecord]) -> io::Result<()> {
        let mut file = fs::File::create(tmp_path)?;
        for record in records {
            writeln!(file, "{}", record.to_line())?;
        }
        file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn identity(ip: &str, mac: &str) -> DeviceIdentity {
        DeviceIdentity::new(ip.parse().unwrap(), mac)
    }

    #[test]
    fn missing_file_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DeviceRegistry::load(dir.path().join("known_devices.txt")).unwrap();
        assert!(registry.is_empty());
        assert!(!registry.is_dirty());
    }

    #[test]
    fn upsert_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_devices.txt");

        let mut registry = DeviceRegistry::load(&path).unwrap();
        let record = DeviceRecord::first_observed(identity("10.0.0.5", "AA:BB:CC:DD:EE:01"), ts(100));
        registry.upsert(record.clone()).unwrap();
        assert!(!registry.is_dirty());

        let reloaded = DeviceRegistry::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get(&record.identity), Some(&record));
    }

    #[test]
    fn upsert_is_idempotent_on_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_devices.txt");
        let mut registry = DeviceRegistry::load(&path).unwrap();

        let id = identity("10.0.0.5", "AA:BB:CC:DD:EE:01");
        registry
            .upsert(DeviceRecord::first_observed(id.clone(), ts(100)))
            .unwrap();
        registry
            .upsert(DeviceRecord::first_observed(id.clone(), ts(200)))
            .unwrap();

        assert_eq!(registry.len(), 1);
        let record = registry.get(&id).unwrap();
        assert_eq!(record.first_seen, ts(100));
        assert_eq!(record.last_seen, ts(200));
    }

    #[test]
    fn load_tolerates_blank_and_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_devices.txt");
        fs::write(
            &path,
            "10.0.0.5,AA:BB:CC:DD:EE:01\n\
             \n\
             garbage line with no commas\n\
             not-an-ip,AA:BB:CC:DD:EE:02\n\
             10.0.0.9,AA:BB:CC:DD:EE:02,2024-01-01T00:00:00+00:00,2024-01-02T00:00:00+00:00\n",
        )
        .unwrap();

        let registry = DeviceRegistry::load(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&identity("10.0.0.5", "AA:BB:CC:DD:EE:01")));
        assert!(registry.contains(&identity("10.0.0.9", "AA:BB:CC:DD:EE:02")));
    }

    #[test]
    fn touch_refreshes_last_seen_via_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_devices.txt");
        let mut registry = DeviceRegistry::load(&path).unwrap();

        let id = identity("10.0.0.5", "AA:BB:CC:DD:EE:01");
        registry
            .upsert(DeviceRecord::first_observed(id.clone(), ts(100)))
            .unwrap();

        assert!(registry.touch(&id, ts(500)));
        assert!(registry.is_dirty());
        registry.flush().unwrap();
        assert!(!registry.is_dirty());

        let reloaded = DeviceRegistry::load(&path).unwrap();
        let record = reloaded.get(&id).unwrap();
        assert_eq!(record.first_seen, ts(100));
        assert_eq!(record.last_seen, ts(500));
    }

    #[test]
    fn touch_unknown_identity_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DeviceRegistry::load(dir.path().join("r.txt")).unwrap();
        assert!(!registry.touch(&identity("10.0.0.5", ""), ts(1)));
        assert!(!registry.is_dirty());
    }

    #[test]
    fn snapshot_is_independent_of_later_mutations() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DeviceRegistry::load(dir.path().join("r.txt")).unwrap();

        let first = identity("10.0.0.5", "AA:BB:CC:DD:EE:01");
        registry
            .upsert(DeviceRecord::first_observed(first.clone(), ts(100)))
            .unwrap();

        let snapshot = registry.snapshot();
        registry
            .upsert(DeviceRecord::first_observed(
                identity("10.0.0.9", "AA:BB:CC:DD:EE:02"),
                ts(101),
            ))
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&first));
    }

    #[test]
    fn same_ip_new_mac_is_a_second_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DeviceRegistry::load(dir.path().join("r.txt")).unwrap();

        registry
            .upsert(DeviceRecord::first_observed(
                identity("10.0.0.5", "AA:BB:CC:DD:EE:01"),
                ts(100),
            ))
            .unwrap();
        registry
            .upsert(DeviceRecord::first_observed(
                identity("10.0.0.5", "AA:BB:CC:DD:EE:99"),
                ts(200),
            ))
            .unwrap();

        assert_eq!(registry.len(), 2);
    }
}
