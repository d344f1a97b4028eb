//! The monitoring cycle loop.
//!
//! One sequential cycle per interval: sweep → detect → register → audit
//! → notify → sleep. The registry is owned and mutated only here, so
//! the snapshot the detector works on cannot change mid-cycle. A failed
//! sweep skips straight to sleeping; it is never treated as "zero
//! devices present". Shutdown is cooperative via a cancellation token,
//! checked at the sleep boundary and while a sweep is in flight.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use lanwarden_core::{AlertEvent, DeviceRecord, ScanResult};
use lanwarden_registry::{AuditLog, DeviceRegistry};

use crate::config::MonitorConfig;
use crate::diff;
use crate::error::Result;
use crate::notify::AlertNotifier;
use crate::scanner::SweepScanner;

pub struct Monitor {
    config: MonitorConfig,
    scanner: SweepScanner,
    registry: DeviceRegistry,
    audit: AuditLog,
    notifier: Arc<AlertNotifier>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        scanner: SweepScanner,
        registry: DeviceRegistry,
        audit: AuditLog,
        notifier: AlertNotifier,
    ) -> Self {
        Self {
            config,
            scanner,
            registry,
            audit,
            notifier: Arc::new(notifier),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Run cycles until the token is cancelled.
    ///
    /// Guaranteed to return within roughly one scan-timeout of
    /// cancellation: the token interrupts both the sleep and an
    /// in-flight sweep.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(
            target = %self.config.target,
            interval_secs = self.config.interval_secs,
            known_devices = self.registry.len(),
            "Monitor started"
        );

        while !shutdown.is_cancelled() {
            if let Err(e) = self.run_cycle(&shutdown).await {
                tracing::error!(error = %e, "Cycle failed; sleeping until next interval");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval()) => {}
            }
        }

        // A pending retry from a failed cycle flush should not be lost.
        if let Err(e) = self.registry.flush() {
            tracing::warn!(error = %e, "Final registry flush failed");
        }

        tracing::info!("Monitor stopped");
        Ok(())
    }

    /// Run exactly one cycle (the `--once` path). Unlike the loop, scan
    /// failures propagate to the caller.
    pub async fn run_once(&mut self) -> Result<()> {
        self.run_cycle(&CancellationToken::new()).await
    }

    async fn run_cycle(&mut self, shutdown: &CancellationToken) -> Result<()> {
        let scan = tokio::select! {
            // Dropping the sweep future kills the child process.
            _ = shutdown.cancelled() => return Ok(()),
            result = self
                .scanner
                .sweep(&self.config.target, self.config.scan_timeout()) => result?,
        };

        let events = self.apply_scan(&scan);
        let summary = diff::summarize(&scan, events.len());
        self.dispatch_all(events).await;

        tracing::info!(
            scan_id = %scan.scan_id,
            observed = summary.total_observed,
            new = summary.new_count,
            duration_ms = scan.duration.as_millis() as u64,
            "Cycle complete"
        );
        Ok(())
    }

    /// Diff a sweep against the registry, register what is new, refresh
    /// what is known, and return the alert events to dispatch.
    ///
    /// Registration is persisted before any event is returned: a crash
    /// here may lose an alert but never forgets a device. A persistence
    /// failure is a warning: the in-memory map is already updated, so
    /// the device will not re-alert this process lifetime, and the
    /// cycle-end flush retries the write until storage recovers.
    pub fn apply_scan(&mut self, scan: &ScanResult) -> Vec<AlertEvent> {
        let known = self.registry.snapshot();
        let new_identities = diff::detect_new(&known, scan);
        let observed_at = scan.started_at;

        for identity in &scan.identities {
            if known.contains(identity) {
                self.registry.touch(identity, observed_at);
            }
        }

        let mut events = Vec::with_capacity(new_identities.len());
        for identity in new_identities {
            tracing::info!(device = %identity, "New device detected");

            let record = DeviceRecord::first_observed(identity.clone(), observed_at);
            if let Err(e) = self.registry.upsert(record) {
                tracing::warn!(
                    device = %identity,
                    error = %e,
                    "Registry write failed; will retry at cycle end"
                );
            }
            if let Err(e) = self.audit.record(&identity, observed_at) {
                tracing::warn!(device = %identity, error = %e, "Audit log write failed");
            }

            events.push(AlertEvent::new_device(identity, observed_at));
        }

        if let Err(e) = self.registry.flush() {
            tracing::warn!(error = %e, "Registry flush failed; will retry next cycle");
        }

        events
    }

    /// Dispatch all events concurrently and wait for every outcome, so
    /// the cycle's logs reflect a consistent result. One failure never
    /// blocks the others.
    async fn dispatch_all(&self, events: Vec<AlertEvent>) {
        if events.is_empty() {
            return;
        }

        let mut sends = JoinSet::new();
        for event in events {
            let notifier = Arc::clone(&self.notifier);
            sends.spawn(async move {
                let outcome = notifier.dispatch(&event).await;
                (event, outcome)
            });
        }

        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((event, Err(e))) => {
                    tracing::warn!(
                        device = %event.identity,
                        error = %e,
                        "Alert dispatch failed; device stays registered"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Alert dispatch task panicked");
                }
            }
        }
    }
}
