//! Change detection: diff one sweep against the known-device snapshot.
//!
//! Pure functions, no I/O. The detector describes the insertions the
//! scheduler should apply; it never mutates the registry itself, which
//! keeps the diff testable and the snapshot stable mid-cycle.

use std::collections::HashSet;

use lanwarden_core::{DeviceIdentity, ScanResult};

/// Identities present in `scan` but absent from `known`, in scan order.
///
/// Repeats within one scan are reported once. Purely existence-based:
/// timestamps play no part.
pub fn detect_new(known: &HashSet<DeviceIdentity>, scan: &ScanResult) -> Vec<DeviceIdentity> {
    let mut seen: HashSet<&DeviceIdentity> = HashSet::new();

    scan.identities
        .iter()
        .filter(|id| seen.insert(*id))
        .filter(|id| !known.contains(*id))
        .cloned()
        .collect()
}

/// Per-cycle counts for the completion log line.
#[derive(Debug, Default)]
pub struct CycleSummary {
    pub total_observed: usize,
    pub new_count: usize,
}

pub fn summarize(scan: &ScanResult, new_count: usize) -> CycleSummary {
    let unique: HashSet<&DeviceIdentity> = scan.identities.iter().collect();
    CycleSummary {
        total_observed: unique.len(),
        new_count,
    }
}
