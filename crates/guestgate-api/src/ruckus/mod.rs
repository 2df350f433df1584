// Ruckus R710 API surface (stateful XML over HTTP).

mod client;
pub mod codec;
mod models;
mod xml;

pub use client::RuckusClient;
pub use models::{GuestServiceConf, GuestServiceEntry, WlanConf, WlanEntry};
