//! Typed HTTP clients for the guest-WiFi captive-portal appliances.
//!
//! Two very different devices hide behind this crate:
//!
//! - **ESP32 portal** ([`PortalClient`]) -- JSON over HTTP. Stateless, but
//!   its batch-lookup envelope sometimes arrives double-encoded (a second
//!   serialized JSON document inside `message`); the client unwraps both
//!   forms before callers see anything.
//! - **Ruckus R710** ([`RuckusClient`]) -- XML over HTTP, stateful: form
//!   login yielding session cookie + CSRF token, a mandatory
//!   session-initialization call, and an `<ajax-request>` envelope whose
//!   success signal is a response *tag*, not an HTTP status. The
//!   [`ruckus::codec`] module owns that wire dialect, including the
//!   name-as-id convention for WLAN updates.
//!
//! Failures surface as [`Error`]; no retries happen at this layer.

pub mod error;
pub mod portal;
pub mod ruckus;
pub mod transport;

pub use error::Error;
pub use portal::{BatchLookup, ClientDevice, CreateTokenRequest, PortalClient, TokenReport};
pub use ruckus::{GuestServiceConf, GuestServiceEntry, RuckusClient, WlanConf, WlanEntry};
pub use transport::{TlsMode, TransportConfig};
