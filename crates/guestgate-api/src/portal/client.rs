// ESP32 portal HTTP client
//
// Wraps `reqwest::Client` with portal-specific URL construction and
// envelope unwrapping. No retries here -- timeouts and connect failures
// surface to the caller, which owns retry policy.

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::portal::models::{
    ActionEnvelope, BatchEnvelope, BatchLookup, CreateTokenRequest, TokenReport,
};
use crate::transport::TransportConfig;

/// Typed HTTP client for the ESP32 captive-portal firmware.
///
/// Every method is a single round trip. Batch lookups always go out as one
/// combined call -- the firmware's HTTP stack does not tolerate concurrent
/// requests well, and the engine layer depends on that single-call shape.
pub struct PortalClient {
    http: reqwest::Client,
    base_url: Url,
    interactive_timeout: std::time::Duration,
    batch_timeout: std::time::Duration,
}

impl PortalClient {
    /// Create a new portal client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            interactive_timeout: transport.interactive_timeout,
            batch_timeout: transport.batch_timeout,
        })
    }

    /// Create a portal client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        let defaults = TransportConfig::default();
        Self {
            http,
            base_url,
            interactive_timeout: defaults.interactive_timeout,
            batch_timeout: defaults.batch_timeout,
        }
    }

    /// The portal base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(&format!("api/{path}"))
            .map_err(Error::InvalidUrl)
    }

    // ── Lookup ───────────────────────────────────────────────────────

    /// Look up many tokens in one round trip.
    ///
    /// Returns only the tokens the portal knows about; callers diff the
    /// result against the requested set to find the missing ones. Uses the
    /// batch timeout.
    pub async fn batch_lookup(&self, identifiers: &[String]) -> Result<BatchLookup, Error> {
        let url = self.api_url("tokens/check")?;
        debug!(count = identifiers.len(), "POST {}", url);

        let body = json!({ "tokens": identifiers });
        let envelope: BatchEnvelope = self
            .post_json(url, &body, self.batch_timeout)
            .await?;

        envelope.into_reports()
    }

    /// Interactive single-token lookup (scanner / checkout flows).
    ///
    /// Same endpoint as [`batch_lookup`](Self::batch_lookup) but with the
    /// short interactive deadline. Returns `None` if the portal does not
    /// know the token.
    pub async fn lookup(&self, identifier: &str) -> Result<Option<TokenReport>, Error> {
        let url = self.api_url("tokens/check")?;
        debug!(token = identifier, "POST {}", url);

        let body = json!({ "tokens": [identifier] });
        let envelope: BatchEnvelope = self
            .post_json(url, &body, self.interactive_timeout)
            .await?;

        Ok(envelope.into_reports()?.reports.into_iter().next())
    }

    // ── Token management ─────────────────────────────────────────────

    /// Create a token on the portal. Returns the device-side view,
    /// including the device-assigned creation/expiry timestamps.
    pub async fn create_token(
        &self,
        request: &CreateTokenRequest,
    ) -> Result<Option<TokenReport>, Error> {
        let url = self.api_url("tokens/create")?;
        debug!(token = request.token, "POST {}", url);

        let envelope: ActionEnvelope = self.post_json(url, request, self.batch_timeout).await?;
        Ok(envelope.into_result()?.token)
    }

    /// Extend a token's validity window by `extra_seconds`.
    pub async fn extend_token(
        &self,
        identifier: &str,
        extra_seconds: u64,
    ) -> Result<(), Error> {
        let url = self.api_url("tokens/extend")?;
        debug!(token = identifier, extra_seconds, "POST {}", url);

        let body = json!({ "token": identifier, "extra_seconds": extra_seconds });
        let envelope: ActionEnvelope = self.post_json(url, &body, self.batch_timeout).await?;
        envelope.into_result().map(|_| ())
    }

    /// Disable a token on the portal (kills any live session).
    pub async fn disable_token(&self, identifier: &str) -> Result<(), Error> {
        let url = self.api_url("tokens/disable")?;
        debug!(token = identifier, "POST {}", url);

        let body = json!({ "token": identifier });
        let envelope: ActionEnvelope = self.post_json(url, &body, self.batch_timeout).await?;
        envelope.into_result().map(|_| ())
    }

    /// Purge expired tokens from the portal's table. Returns the number
    /// of entries the device removed.
    pub async fn purge_expired(&self) -> Result<u32, Error> {
        let url = self.api_url("tokens/purge")?;
        debug!("POST {}", url);

        let body = json!({});
        let envelope: ActionEnvelope = self.post_json(url, &body, self.batch_timeout).await?;
        Ok(envelope.into_result()?.purged.unwrap_or(0))
    }

    /// Liveness probe (health-check flows).
    pub async fn ping(&self) -> Result<(), Error> {
        let url = self.api_url("status")?;
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .timeout(self.interactive_timeout)
            .send()
            .await
            .map_err(Error::Transport)?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::PortalApi {
                message: format!("status probe returned HTTP {}", resp.status()),
            })
        }
    }

    // ── Request plumbing ─────────────────────────────────────────────

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl serde::Serialize + Sync),
        timeout: std::time::Duration,
    ) -> Result<T, Error> {
        let resp = self
            .http
            .post(url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        let text = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::PortalApi {
                message: format!("HTTP {status}: {}", crate::error::body_preview(&text)),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            let preview = crate::error::body_preview(&text);
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: text.clone(),
            }
        })
    }
}
