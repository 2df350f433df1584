use thiserror::Error;

/// Top-level error type for the `guestgate-api` crate.
///
/// Covers every failure mode across both appliance surfaces:
/// session authentication, transport, the ESP32 portal's JSON API, and the
/// R710's XML conf API. `guestgate-core` maps these into domain-level
/// diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login failed (wrong credentials, lockout, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// A conf call was issued before `login()` / `init_session()`.
    #[error("No device session -- login and session init required first")]
    SessionRequired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── ESP32 portal API ────────────────────────────────────────────
    /// The portal returned a well-formed error envelope.
    #[error("Portal API error: {message}")]
    PortalApi { message: String },

    // ── R710 conf API ───────────────────────────────────────────────
    /// The appliance returned an explicit error response to a write.
    #[error("Device rejected write to {component}: {message}")]
    DeviceRejected { component: String, message: String },

    /// A conf response could not be interpreted as an ajax-request reply.
    #[error("Malformed device response: {message}")]
    MalformedResponse { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the appliance could not be reached at all
    /// (connect failure or timeout) -- the caller may retry later
    /// without any local state having changed.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Returns `true` if re-authentication might resolve this error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::SessionRequired)
    }
}

/// First ~200 bytes of a response body for error messages, truncated on
/// a char boundary (device bodies can be UTF-8 with multi-byte runs).
pub(crate) fn body_preview(text: &str) -> &str {
    const LIMIT: usize = 200;
    if text.len() <= LIMIT {
        return text;
    }
    let mut end = LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
