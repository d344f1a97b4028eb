//! Sweep process wrapper.
//!
//! Executes the external host-discovery tool as a child process via
//! `tokio::process::Command` and parses its text output into identities.
//! The child is spawned with `kill_on_drop`, so when the timeout (or a
//! shutdown) drops the in-flight future, the process is terminated
//! rather than left running.

use std::io;
use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::process::Command;
use uuid::Uuid;

use lanwarden_core::ScanResult;

use crate::error::ScanError;
use crate::sweep;

/// Host-discovery flags: ping sweep only, no port scan, no DNS lookups.
fn sweep_flags() -> Vec<&'static str> {
    vec!["-sn", "-n"]
}

/// Wrapper around the sweep binary.
pub struct SweepScanner {
    sweep_path: String,
}

impl SweepScanner {
    pub fn new(sweep_path: &str) -> Self {
        Self {
            sweep_path: sweep_path.to_string(),
        }
    }

    /// Verify the sweep tool is installed and accessible.
    pub async fn verify_installation(&self) -> Result<String, ScanError> {
        let output = Command::new(&self.sweep_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.classify_spawn_error(e))?;

        String::from_utf8(output.stdout).map_err(|e| ScanError::UnparsableOutput(e.to_string()))
    }

    /// Run one sweep of `target`, bounded by `timeout`.
    ///
    /// No state is retained between calls; the returned `ScanResult`
    /// lives for one cycle.
    pub async fn sweep(&self, target: &str, timeout: Duration) -> Result<ScanResult, ScanError> {
        let scan_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!(
            scan_id = %scan_id,
            target = %target,
            "Starting sweep"
        );

        let child = Command::new(&self.sweep_path)
            .args(sweep_flags())
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.classify_spawn_error(e))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            // The dropped future owned the child; kill_on_drop reaps it.
            Err(_) => {
                return Err(ScanError::Timeout {
                    target: target.to_string(),
                    timeout,
                })
            }
        };

        let duration = start.elapsed();

        if !output.status.success() {
            return Err(ScanError::SweepFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| ScanError::UnparsableOutput(e.to_string()))?;
        let identities = sweep::parse_sweep_output(&stdout);

        tracing::info!(
            scan_id = %scan_id,
            target = %target,
            hosts = identities.len(),
            duration_ms = duration.as_millis() as u64,
            "Sweep complete"
        );

        Ok(ScanResult {
            scan_id,
            started_at,
            duration,
            identities,
        })
    }

    fn classify_spawn_error(&self, e: io::Error) -> ScanError {
        if e.kind() == io::ErrorKind::NotFound {
            ScanError::ToolNotFound {
                path: self.sweep_path.clone(),
            }
        } else {
            ScanError::Io(e)
        }
    }
}
