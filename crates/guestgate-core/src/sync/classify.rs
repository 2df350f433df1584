// ── Report classification ──
//
// Pure decision logic for batch reconciliation, kept free of I/O so the
// lifecycle properties are testable in isolation. Device responses are
// untrusted input: they get classified against local state here before
// anything is written.

use chrono::{DateTime, Utc};
use guestgate_api::TokenReport;

use crate::model::TokenStatus;

/// Device-side status vocabulary, parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Active,
    Expired,
    Unused,
}

impl DeviceStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "unused" => Some(Self::Unused),
            _ => None,
        }
    }
}

/// How a requested token should be reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Device knows the token and reported a live status.
    Found(DeviceStatus),
    /// Device does not know the token -- either absent from the response
    /// or flagged "not found" inside a nominally successful envelope.
    Missing,
}

/// Known not-found phrasings devices hide inside success envelopes.
fn is_not_found_error(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("not found") || lower.contains("unknown token")
}

/// Classify one found entry from a batch response.
///
/// A per-token failure flag with not-found phrasing demotes the entry to
/// `Missing` -- devices report "not found" inside successful envelopes
/// often enough that trusting the outer success alone flaps tokens.
pub fn classify_report(report: &TokenReport) -> Classification {
    if !report.success {
        if report.error.as_deref().is_some_and(is_not_found_error) {
            return Classification::Missing;
        }
        // Failed for another reason (device busy, etc.) -- no status to
        // apply; treat as unused so only counters could move, which a
        // failed entry doesn't carry anyway.
        return Classification::Found(DeviceStatus::Unused);
    }

    match report.status.as_deref().and_then(DeviceStatus::parse) {
        Some(status) => Classification::Found(status),
        None => Classification::Found(DeviceStatus::Unused),
    }
}

/// The asymmetric missing-token rule: a vanished token that was never
/// used was cleaned up pre-activation (`DISABLED`); one that *was* used
/// ran out its timer (`EXPIRED`). `first_used_at` is the one
/// disambiguating fact the local ledger owns.
pub fn status_for_missing(first_used_at: Option<DateTime<Utc>>) -> TokenStatus {
    if first_used_at.is_some() {
        TokenStatus::Expired
    } else {
        TokenStatus::Disabled
    }
}
