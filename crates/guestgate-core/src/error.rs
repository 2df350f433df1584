// ── Core error types ──
//
// Domain-level errors. Consumers never see raw HTTP or parse failures;
// the `From<guestgate_api::Error>` impl translates transport errors into
// the taxonomy callers act on -- most importantly the unreachable /
// rejected / unverified distinction.

use thiserror::Error;

use crate::model::TokenStatus;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation (rejected before any device call) ─────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Ledger ───────────────────────────────────────────────────────
    #[error("Token not found in ledger: {identifier}")]
    TokenNotFound { identifier: String },

    #[error("Token {identifier}: illegal transition {from} -> {to}")]
    InvalidTransition {
        identifier: String,
        from: TokenStatus,
        to: TokenStatus,
    },

    // ── Device interaction ───────────────────────────────────────────
    /// The appliance could not be reached (connect failure or timeout).
    /// Local state is untouched; the caller's scheduler decides on retry.
    #[error("Device unreachable: {message}")]
    DeviceUnreachable { message: String },

    /// The appliance returned a well-formed error envelope for a write.
    #[error("Device rejected write to {component}: {message}")]
    DeviceRejected { component: String, message: String },

    /// The device accepted a configuration write but post-write
    /// verification could not confirm the change. Distinct from
    /// [`DeviceRejected`](Self::DeviceRejected) -- nothing downstream may
    /// persist the "confirmed" configuration on this outcome.
    #[error("Configuration unverified: WLAN '{expected_ssid}' not confirmed after write")]
    ConfigUnverified { expected_ssid: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Wrapped appliance errors ─────────────────────────────────────
    #[error("Device API error: {message}")]
    Api { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<guestgate_api::Error> for CoreError {
    fn from(err: guestgate_api::Error) -> Self {
        if err.is_unreachable() {
            return CoreError::DeviceUnreachable {
                message: err.to_string(),
            };
        }
        match err {
            guestgate_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            guestgate_api::Error::SessionRequired => CoreError::AuthenticationFailed {
                message: "no device session -- login and session init required".into(),
            },
            guestgate_api::Error::DeviceRejected { component, message } => {
                CoreError::DeviceRejected { component, message }
            }
            guestgate_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("deserialization error: {message}"))
            }
            other => CoreError::Api {
                message: other.to_string(),
            },
        }
    }
}
