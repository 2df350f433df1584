// ── Token ledger ──
//
// The authoritative local record of every issued token. All status
// mutations funnel through the transition helpers here, which enforce the
// state machine -- the sync engine and admin actions never write a status
// directly. Transitions are monotonic, so overlapping reconciliation
// passes converge without a ledger-wide lock.

mod collection;

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use crate::convert::{ObservedDevice, UsageSnapshot};
use crate::error::CoreError;
use crate::model::{DeviceConnection, SyncLog, Token, TokenStatus};

use collection::TokenCollection;

/// Authoritative store for tokens, association history, and sync audit rows.
pub struct TokenLedger {
    tokens: TokenCollection,
    /// Append-only association history. Open rows (no `disconnected_at`)
    /// are updated in place; closed rows are never touched again.
    connections: RwLock<Vec<DeviceConnection>>,
    /// Append-only audit trail.
    sync_logs: RwLock<Vec<SyncLog>>,
}

impl Default for TokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenLedger {
    pub fn new() -> Self {
        Self {
            tokens: TokenCollection::new(),
            connections: RwLock::new(Vec::new()),
            sync_logs: RwLock::new(Vec::new()),
        }
    }

    // ── Row access ───────────────────────────────────────────────────

    /// Insert a new token row. The username must be globally unique.
    pub fn register(&self, token: Token) -> Result<Arc<Token>, CoreError> {
        let username = token.username.clone();
        if !self.tokens.upsert(token) {
            return Err(CoreError::Validation {
                message: format!("token '{username}' already exists"),
            });
        }
        Ok(self
            .tokens
            .get(&username)
            .unwrap_or_else(|| unreachable!("row inserted above")))
    }

    pub fn get(&self, username: &str) -> Option<Arc<Token>> {
        self.tokens.get(username)
    }

    pub fn snapshot(&self) -> Arc<Vec<Arc<Token>>> {
        self.tokens.snapshot()
    }

    /// Subscribe to ledger snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Token>>>> {
        self.tokens.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.len() == 0
    }

    // ── Status transitions ───────────────────────────────────────────

    fn transition(
        &self,
        username: &str,
        to: TokenStatus,
        also: impl FnOnce(&mut Token),
    ) -> Result<Arc<Token>, CoreError> {
        let current = self.get(username).ok_or_else(|| CoreError::TokenNotFound {
            identifier: username.to_owned(),
        })?;

        if !current.status.can_advance_to(to) {
            return Err(CoreError::InvalidTransition {
                identifier: username.to_owned(),
                from: current.status,
                to,
            });
        }

        debug!(token = username, from = %current.status, %to, "status transition");
        self.tokens
            .mutate(username, |t| {
                t.status = to;
                also(t);
            })
            .ok_or_else(|| CoreError::TokenNotFound {
                identifier: username.to_owned(),
            })
    }

    /// `AVAILABLE -> SOLD` on a completed purchase.
    pub fn mark_sold(&self, username: &str, at: DateTime<Utc>) -> Result<Arc<Token>, CoreError> {
        self.transition(username, TokenStatus::Sold, |t| t.sold_at = Some(at))
    }

    /// First confirmed device-side use. Sets `first_used_at` exactly once;
    /// a token already `ACTIVE` is left as-is (idempotent re-report).
    pub fn mark_active(
        &self,
        username: &str,
        first_used_at: DateTime<Utc>,
    ) -> Result<Arc<Token>, CoreError> {
        let current = self.get(username).ok_or_else(|| CoreError::TokenNotFound {
            identifier: username.to_owned(),
        })?;
        if current.status == TokenStatus::Active {
            return Ok(current);
        }
        self.transition(username, TokenStatus::Active, |t| {
            if t.first_used_at.is_none() {
                t.first_used_at = Some(first_used_at);
            }
        })
    }

    /// `ACTIVE -> EXPIRED`. Only consumed tokens expire; the state machine
    /// rejects this for anything pre-use.
    pub fn mark_expired(&self, username: &str) -> Result<Arc<Token>, CoreError> {
        self.transition(username, TokenStatus::Expired, |_| {})
    }

    /// Pre-use removal: `AVAILABLE/SOLD -> DISABLED`.
    pub fn mark_disabled(&self, username: &str) -> Result<Arc<Token>, CoreError> {
        self.transition(username, TokenStatus::Disabled, |_| {})
    }

    /// Explicit admin void. Idempotent: a token already in a terminal
    /// state is returned unchanged rather than transitioned again.
    pub fn invalidate(&self, username: &str) -> Result<Arc<Token>, CoreError> {
        let current = self.get(username).ok_or_else(|| CoreError::TokenNotFound {
            identifier: username.to_owned(),
        })?;
        if current.is_terminal() {
            return Ok(current);
        }
        self.transition(username, TokenStatus::Invalidated, |_| {})
    }

    // ── Device-reported fields ───────────────────────────────────────

    /// Replace usage counters and device hints from a report -- the device
    /// is authoritative for cumulative values -- and stamp `last_synced_at`.
    pub fn apply_usage(
        &self,
        username: &str,
        usage: &UsageSnapshot,
        now: DateTime<Utc>,
    ) -> Option<Arc<Token>> {
        self.tokens.mutate(username, |t| {
            t.bytes_up = usage.bytes_up;
            t.bytes_down = usage.bytes_down;
            t.usage_count = usage.usage_count;
            if usage.hostname.is_some() {
                t.hostname = usage.hostname.clone();
            }
            if usage.device_type.is_some() {
                t.device_type = usage.device_type.clone();
            }
            if usage.connected_mac.is_some() {
                t.connected_mac = usage.connected_mac.clone();
            }
            if usage.created_at.is_some() {
                t.created_at = usage.created_at;
            }
            if usage.expires_at.is_some() {
                t.expires_at = usage.expires_at;
            }
            t.last_synced_at = Some(now);
        })
    }

    /// Stamp `last_synced_at` without touching anything else (used for
    /// tokens reconciled from local state alone).
    pub fn touch_synced(&self, username: &str, now: DateTime<Utc>) -> Option<Arc<Token>> {
        self.tokens.mutate(username, |t| t.last_synced_at = Some(now))
    }

    /// Lengthen the validity window after the device has accepted an
    /// extension. The expiry hint only moves if the device ever reported
    /// one.
    pub fn extend_validity(&self, username: &str, extra_seconds: u64) -> Option<Arc<Token>> {
        self.tokens.mutate(username, |t| {
            t.valid_time_seconds += extra_seconds;
            if let Some(expires) = t.expires_at {
                t.expires_at = Some(expires + chrono::Duration::seconds(extra_seconds as i64));
            }
        })
    }

    // ── Association history ──────────────────────────────────────────

    /// Reconcile the association history for one token against a device
    /// report: open rows for newly-seen MACs, refresh counters on rows
    /// still present, and close open rows whose MAC disappeared.
    pub fn observe_devices(&self, username: &str, usage: &UsageSnapshot, now: DateTime<Utc>) {
        let observed: &[ObservedDevice] = &usage.devices;
        let mut rows = self.connections.write().expect("connections lock poisoned");

        for device in observed {
            let open = rows
                .iter_mut()
                .find(|r| r.token_username == username && r.mac == device.mac && r.is_open());

            match open {
                Some(row) => {
                    row.bytes_up = usage.bytes_up;
                    row.bytes_down = usage.bytes_down;
                    row.last_ip = device.ip.clone();
                    row.hostname = usage.hostname.clone();
                }
                None => {
                    debug!(token = username, mac = %device.mac, "new device association");
                    let mut row =
                        DeviceConnection::open(username.to_owned(), device.mac.clone(), now);
                    row.bytes_up = usage.bytes_up;
                    row.bytes_down = usage.bytes_down;
                    row.last_ip = device.ip.clone();
                    row.hostname = usage.hostname.clone();
                    rows.push(row);
                }
            }
        }

        // Close rows for MACs no longer reported.
        for row in rows
            .iter_mut()
            .filter(|r| r.token_username == username && r.is_open())
        {
            if !observed.iter().any(|d| d.mac == row.mac) {
                debug!(token = username, mac = %row.mac, "association closed");
                row.disconnected_at = Some(now);
            }
        }
    }

    pub fn connections_for(&self, username: &str) -> Vec<DeviceConnection> {
        self.connections
            .read()
            .expect("connections lock poisoned")
            .iter()
            .filter(|r| r.token_username == username)
            .cloned()
            .collect()
    }

    // ── Audit trail ──────────────────────────────────────────────────

    pub fn append_sync_log(&self, log: SyncLog) {
        self.sync_logs
            .write()
            .expect("sync log lock poisoned")
            .push(log);
    }

    pub fn sync_logs(&self) -> Vec<SyncLog> {
        self.sync_logs
            .read()
            .expect("sync log lock poisoned")
            .clone()
    }
}
