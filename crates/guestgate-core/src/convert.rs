// ── Wire-to-domain conversion ──
//
// Maps portal `TokenReport`s into the usage snapshot the ledger applies.
// The portal reports whole-second epoch timestamps; they become absolute
// `DateTime<Utc>` values here (×1000 to milliseconds).

use chrono::{DateTime, Utc};
use guestgate_api::TokenReport;

use crate::model::MacAddress;

/// Convert a device epoch-seconds timestamp to absolute time.
///
/// Zero and negative values are treated as "not reported" -- the firmware
/// emits 0 for fields it has never populated.
pub(crate) fn epoch_seconds(secs: Option<i64>) -> Option<DateTime<Utc>> {
    let secs = secs.filter(|s| *s > 0)?;
    DateTime::<Utc>::from_timestamp_millis(secs.checked_mul(1000)?)
}

/// One observed client device, normalized.
#[derive(Debug, Clone)]
pub struct ObservedDevice {
    pub mac: MacAddress,
    pub online: bool,
    pub ip: Option<String>,
}

/// Device-reported usage snapshot for one token.
///
/// Counters always *replace* the ledger's copy -- the device owns the
/// cumulative totals.
#[derive(Debug, Clone)]
pub struct UsageSnapshot {
    pub bytes_up: u64,
    pub bytes_down: u64,
    pub usage_count: u32,
    pub hostname: Option<String>,
    pub device_type: Option<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub connected_mac: Option<MacAddress>,
    pub devices: Vec<ObservedDevice>,
}

impl From<&TokenReport> for UsageSnapshot {
    fn from(report: &TokenReport) -> Self {
        let devices: Vec<ObservedDevice> = report
            .devices
            .iter()
            .map(|d| ObservedDevice {
                mac: MacAddress::new(&d.mac),
                online: d.online,
                ip: d.ip.clone(),
            })
            .collect();

        Self {
            bytes_up: report.bandwidth_up,
            bytes_down: report.bandwidth_down,
            usage_count: report.usage_count,
            hostname: report.hostname.clone(),
            device_type: report.device_type.clone(),
            first_seen: epoch_seconds(report.first_seen),
            last_seen: epoch_seconds(report.last_seen),
            created_at: epoch_seconds(report.created_at),
            expires_at: epoch_seconds(report.expires_at),
            connected_mac: devices.first().map(|d| d.mac.clone()),
            devices,
        }
    }
}
