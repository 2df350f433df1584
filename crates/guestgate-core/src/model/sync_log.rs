// ── Sync audit rows ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of device interaction produced a [`SyncLog`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    BatchSync,
    HealthCheck,
}

/// Overall outcome of one sync/health-check invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    /// Some per-token updates failed; the rest landed.
    Partial,
    DeviceUnreachable,
    Failed,
}

/// One append-only audit row per batch-sync or health-check invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: Uuid,
    pub kind: SyncKind,
    pub checked: u32,
    pub updated: u32,
    pub outcome: SyncOutcome,
    pub duration_ms: u64,
    pub at: DateTime<Utc>,
}

impl SyncLog {
    pub fn record(kind: SyncKind, checked: u32, updated: u32, outcome: SyncOutcome, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            checked,
            updated,
            outcome,
            duration_ms,
            at: Utc::now(),
        }
    }
}
