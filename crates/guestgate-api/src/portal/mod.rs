// ESP32 captive-portal API surface (JSON over HTTP).

mod client;
mod models;

pub use client::PortalClient;
pub use models::{BatchLookup, ClientDevice, CreateTokenRequest, TokenReport};
