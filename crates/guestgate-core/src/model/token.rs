// ── Token domain type and lifecycle state machine ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mac::MacAddress;

/// Lifecycle state of a guest-access token.
///
/// States only ever advance along the directed edges encoded in
/// [`can_advance_to`](Self::can_advance_to); the terminal states are never
/// left. This monotonicity is what makes concurrent reconciliation passes
/// safe without a ledger-wide lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    /// Pre-provisioned, not yet sold.
    Available,
    /// Sold to a guest, no device-side usage observed yet.
    Sold,
    /// First device-side use confirmed (`first_used_at` populated).
    Active,
    /// Terminal: validity window ran out after the token was used.
    Expired,
    /// Terminal: removed from the device before ever being used.
    Disabled,
    /// Terminal: explicit admin void.
    Invalidated,
}

impl TokenStatus {
    /// Terminal states are skipped by every reconciliation pass.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Disabled | Self::Invalidated)
    }

    /// Whether the state machine permits `self -> to`.
    ///
    /// `Expired` is reachable only from `Active` -- a token that was never
    /// used cannot be "consumed"; the pre-use removal path is `Disabled`.
    /// Admin invalidation is allowed from any non-terminal state.
    pub fn can_advance_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (Self::Available, Self::Sold | Self::Active | Self::Disabled)
            | (Self::Sold, Self::Active | Self::Disabled)
            | (Self::Active, Self::Expired)
            | (_, Self::Invalidated) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::Sold => "sold",
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Disabled => "disabled",
            Self::Invalidated => "invalidated",
        };
        write!(f, "{s}")
    }
}

/// A guest-access credential tracked in the local ledger.
///
/// Mutated exclusively through [`TokenLedger`](crate::TokenLedger)
/// operations; the ledger enforces the state machine and the
/// set-at-most-once rule for `first_used_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub tenant_id: Uuid,
    /// Globally-unique credential name; the ledger key.
    pub username: String,
    pub secret: String,
    /// WLAN the token grants access to.
    pub wlan: String,
    /// Configuration-template reference, if provisioned from one.
    pub template: Option<String>,
    pub status: TokenStatus,
    /// Validity window length sold to the guest, in seconds.
    pub valid_time_seconds: u64,
    /// Device-reported creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Device-reported expiry timestamp.
    pub expires_at: Option<DateTime<Utc>>,
    /// Set on the first confirmed device-side use; never cleared.
    pub first_used_at: Option<DateTime<Utc>>,
    /// Last / primary associated client device.
    pub connected_mac: Option<MacAddress>,
    pub hostname: Option<String>,
    pub device_type: Option<String>,
    /// Cumulative counters -- the device is authoritative, values replace.
    pub bytes_up: u64,
    pub bytes_down: u64,
    pub usage_count: u32,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sold_at: Option<DateTime<Utc>>,
}

impl Token {
    /// A fresh pre-provisioned token.
    pub fn new(tenant_id: Uuid, username: String, secret: String, wlan: String) -> Self {
        Self {
            tenant_id,
            username,
            secret,
            wlan,
            template: None,
            status: TokenStatus::Available,
            valid_time_seconds: 0,
            created_at: None,
            expires_at: None,
            first_used_at: None,
            connected_mac: None,
            hostname: None,
            device_type: None,
            bytes_up: 0,
            bytes_down: 0,
            usage_count: 0,
            last_synced_at: None,
            sold_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
