//! lanwarden-core: Shared domain types for the lanwarden presence monitor.
//!
//! This crate provides the types passed between the monitor's components:
//! - `DeviceIdentity`: the IP+MAC pair that keys "same device" across scans
//! - `DeviceRecord`: a registry entry with first/last observation times
//! - `ScanResult`: one sweep's observations in output order
//! - `AlertEvent`: a pending notification for a newly observed device

pub mod types;

pub use types::{AlertEvent, DeviceIdentity, DeviceRecord, ParseRecordError, ScanResult};
