// Wire types for the ESP32 portal's JSON API.
//
// The portal wraps everything in a `{success, ...}` envelope. Firmware
// builds differ in one annoying way: some return the payload inline
// (`tokens: [...]`), others stuff a second serialized JSON document into
// `message`. `BatchEnvelope::into_reports` handles both.

use serde::Deserialize;

use crate::error::Error;

/// One client device currently (or recently) associated with a token.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientDevice {
    pub mac: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Device-side view of a single token, as reported by the portal.
///
/// All counters are cumulative totals owned by the device; timestamps are
/// whole-second epoch values.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenReport {
    #[serde(alias = "token")]
    pub identifier: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// `active` | `expired` | `unused` (case varies by firmware).
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub bandwidth_up: u64,
    #[serde(default)]
    pub bandwidth_down: u64,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub first_seen: Option<i64>,
    #[serde(default)]
    pub last_seen: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub device_count: u32,
    #[serde(default)]
    pub devices: Vec<ClientDevice>,
}

fn default_true() -> bool {
    true
}

/// Result of a whole batch-lookup round trip.
#[derive(Debug, Clone)]
pub struct BatchLookup {
    pub reports: Vec<TokenReport>,
    pub total_requested: u32,
    pub total_found: u32,
}

/// Envelope of the batch lookup response.
#[derive(Debug, Deserialize)]
pub(crate) struct BatchEnvelope {
    pub success: bool,
    #[serde(default)]
    pub tokens: Option<Vec<TokenReport>>,
    /// Either a human-readable error or a nested serialized payload.
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub total_requested: Option<u32>,
    #[serde(default)]
    pub total_found: Option<u32>,
}

impl BatchEnvelope {
    /// Unwrap the envelope into per-token reports, following one level of
    /// nesting if the payload arrived double-encoded inside `message`.
    pub(crate) fn into_reports(self) -> Result<BatchLookup, Error> {
        if !self.success {
            let message = self
                .error
                .or(self.message)
                .unwrap_or_else(|| "portal reported failure without a message".into());
            return Err(Error::PortalApi { message });
        }

        if let Some(tokens) = self.tokens {
            let total_found = self.total_found.unwrap_or(tokens.len() as u32);
            return Ok(BatchLookup {
                total_requested: self.total_requested.unwrap_or(tokens.len() as u32),
                total_found,
                reports: tokens,
            });
        }

        // No inline payload: the real envelope may be serialized into `message`.
        if let Some(inner) = self.message {
            let nested: BatchEnvelope =
                serde_json::from_str(&inner).map_err(|e| Error::Deserialization {
                    message: format!("nested batch envelope: {e}"),
                    body: inner.clone(),
                })?;
            return nested.into_reports();
        }

        // Success with neither `tokens` nor `message` -- nothing matched.
        Ok(BatchLookup {
            reports: Vec::new(),
            total_requested: self.total_requested.unwrap_or(0),
            total_found: self.total_found.unwrap_or(0),
        })
    }
}

/// Envelope of the single-token management calls (create/extend/disable).
#[derive(Debug, Deserialize)]
pub(crate) struct ActionEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub token: Option<TokenReport>,
    #[serde(default)]
    pub purged: Option<u32>,
}

impl ActionEnvelope {
    pub(crate) fn into_result(self) -> Result<Self, Error> {
        if self.success {
            Ok(self)
        } else {
            Err(Error::PortalApi {
                message: self
                    .error
                    .or(self.message)
                    .unwrap_or_else(|| "portal reported failure without a message".into()),
            })
        }
    }
}

/// Request body for creating a token on the portal.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CreateTokenRequest {
    pub token: String,
    pub secret: String,
    pub valid_time_seconds: u64,
}
