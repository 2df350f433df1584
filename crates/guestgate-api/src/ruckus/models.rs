// Configuration-object types for the R710 conf API.

/// Desired state of a WLAN object.
///
/// The device identifies a WLAN by its *current* SSID string, not a numeric
/// id -- renaming therefore needs the old SSID as the update key while this
/// struct carries the new one. The codec handles that split; engine code
/// never sees name-as-id.
#[derive(Debug, Clone)]
pub struct WlanConf {
    /// Server-assigned numeric id, known after a `getconf`. Required for
    /// deletion, optional for update (the SSID key drives updates).
    pub id: Option<String>,
    /// Network name / SSID to set.
    pub ssid: String,
    pub description: String,
    /// Stable id of the paired guest service object (1:1).
    pub guest_service_id: String,
    /// Whether guest tokens are numeric-only (affects portal keypad entry).
    pub numeric_tokens: bool,
    /// Keep guest clients isolated from each other.
    pub client_isolation: bool,
    /// Maximum concurrent clients on this WLAN.
    pub max_clients: u32,
}

/// Desired state of a Guest Service (captive-portal branding) object.
#[derive(Debug, Clone)]
pub struct GuestServiceConf {
    /// Stable object id -- unlike WLANs, guest services update by id.
    pub id: String,
    pub name: String,
    /// Display title shown on the portal splash page.
    pub title: String,
    /// Access validity window granted at login, in seconds.
    pub validity_seconds: u64,
    /// Logo variant identifier.
    pub logo: String,
}

/// A WLAN object as read back from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WlanEntry {
    pub id: String,
    pub name: String,
    pub ssid: String,
}

/// A Guest Service object as read back from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestServiceEntry {
    pub id: String,
    pub name: String,
}
