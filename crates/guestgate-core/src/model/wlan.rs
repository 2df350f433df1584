// ── WLAN / guest-service configuration (domain view) ──
//
// Engine-side description of a wireless network and its paired captive
// portal. Stable internal identifiers only; the vendor's name-as-id
// convention lives entirely inside `guestgate-api`.

use serde::{Deserialize, Serialize};

/// Captive-portal branding paired 1:1 with a WLAN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestServiceSettings {
    /// Stable device-side object id.
    pub id: String,
    /// Display title on the splash page.
    pub title: String,
    /// Access validity window granted at login, in seconds.
    pub validity_seconds: u64,
    /// Logo variant identifier.
    pub logo: String,
}

/// Desired state of a guest WLAN and its portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WlanSettings {
    /// Network name / SSID to set.
    pub ssid: String,
    pub description: String,
    pub guest_service: GuestServiceSettings,
    /// Whether guest tokens are numeric-only.
    pub numeric_tokens: bool,
    pub client_isolation: bool,
    pub max_clients: u32,
}

/// A requested configuration change: the SSID the device currently knows
/// plus the full desired state. Carrying the current SSID explicitly is
/// what makes renames expressible -- see the coordinator.
#[derive(Debug, Clone)]
pub struct WlanChange {
    pub current_ssid: String,
    pub settings: WlanSettings,
}
