// ── Domain model ──

mod connection;
mod mac;
mod sync_log;
mod token;
mod wlan;

pub use connection::DeviceConnection;
pub use mac::MacAddress;
pub use sync_log::{SyncKind, SyncLog, SyncOutcome};
pub use token::{Token, TokenStatus};
pub use wlan::{GuestServiceSettings, WlanChange, WlanSettings};
