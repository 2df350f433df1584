//! Token lifecycle and device-synchronization engine for the guest-WiFi
//! workspace.
//!
//! This crate owns the business logic between `guestgate-api` and its
//! consumers:
//!
//! - **[`TokenLedger`]** — Lock-free reactive token store (`DashMap` +
//!   `tokio::sync::watch` snapshots). Enforces the lifecycle state
//!   machine: `AVAILABLE → SOLD → ACTIVE → EXPIRED`, with `DISABLED` for
//!   pre-use removal and `INVALIDATED` for administrative voids. Terminal
//!   states are never left.
//!
//! - **[`SyncEngine`]** — Reconciles ledger state against the portal
//!   appliance in batches of at most [`MAX_BATCH_SIZE`] tokens per round
//!   trip, tolerating per-token failures. Also hosts the sale,
//!   invalidation, extension, and health-check entry points.
//!
//! - **[`ConfigUpdateCoordinator`]** — Three-step WLAN / guest-service
//!   write protocol against the access point, with a mandatory read-back
//!   verification step ([`CoreError::ConfigUnverified`] when the device
//!   acknowledged but did not apply).
//!
//! - **[`DebouncedLookup`]** — Turns a barcode scanner's raw key stream
//!   into at most one device lookup per scan (debounce, duplicate
//!   suppression, single-flight with cancellation).
//!
//! - **Domain model** ([`model`]) — `Token`, `DeviceConnection`,
//!   `SyncLog`, and the WLAN configuration types.

pub mod convert;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod lookup;
pub mod model;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use convert::UsageSnapshot;
pub use coordinator::ConfigUpdateCoordinator;
pub use error::CoreError;
pub use ledger::TokenLedger;
pub use lookup::{DebouncedLookup, ScanOptions, TokenLookup};
pub use model::{Token, TokenStatus};
pub use sync::{BatchSyncReport, NewSale, SyncEngine, MAX_BATCH_SIZE};
