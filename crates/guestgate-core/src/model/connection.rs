// ── Device association history ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mac::MacAddress;

/// Append-only record of one token/MAC association over time.
///
/// Opened when the sync engine first observes a device on a token; closed
/// (`disconnected_at` set) when the association disappears from a later
/// device report. Closed rows are never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConnection {
    pub id: Uuid,
    pub token_username: String,
    pub mac: MacAddress,
    pub connected_at: DateTime<Utc>,
    pub disconnected_at: Option<DateTime<Utc>>,
    /// Cumulative counters snapshotted from the latest device report.
    pub bytes_up: u64,
    pub bytes_down: u64,
    pub last_ip: Option<String>,
    pub hostname: Option<String>,
}

impl DeviceConnection {
    pub fn open(token_username: String, mac: MacAddress, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_username,
            mac,
            connected_at: at,
            disconnected_at: None,
            bytes_up: 0,
            bytes_down: 0,
            last_ip: None,
            hostname: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.disconnected_at.is_none()
    }
}
