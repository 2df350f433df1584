// ── Device synchronization ──

pub mod classify;
mod engine;

pub use engine::{BatchSyncReport, NewSale, SyncEngine, MAX_BATCH_SIZE};
