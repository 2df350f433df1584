// R710 conf-API HTTP client
//
// The appliance's web endpoints are stateful: a form login yields a session
// cookie plus a CSRF token, and one session-initialization call must land
// before any conf query returns data. This client owns that choreography;
// callers see typed reads and writes against stable internal ids only.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::ruckus::codec;
use crate::ruckus::models::{GuestServiceConf, GuestServiceEntry, WlanConf, WlanEntry};
use crate::transport::TransportConfig;

/// Stateful HTTP client for the R710's XML conf API.
///
/// Conf calls are strictly sequential -- the firmware's session endpoints
/// are order-sensitive and do not support concurrent requests, so this
/// client never fans out.
pub struct RuckusClient {
    http: reqwest::Client,
    base_url: Url,
    /// CSRF token captured at login and rotated from response headers.
    csrf_token: RwLock<Option<String>>,
    /// Set once `init_session` has succeeded; conf calls before that
    /// return empty data, so we fail them fast instead.
    session_ready: AtomicBool,
    timeout: std::time::Duration,
}

impl RuckusClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// A cookie jar is added automatically if the config lacks one -- the
    /// session cookie from login is the whole auth story here.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let timeout = config.batch_timeout;
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url,
            csrf_token: RwLock::new(None),
            session_ready: AtomicBool::new(false),
            timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client` (tests, shared jars).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            csrf_token: RwLock::new(None),
            session_ready: AtomicBool::new(false),
            timeout: TransportConfig::default().batch_timeout,
        }
    }

    /// The appliance base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn admin_url(&self, page: &str) -> Result<Url, Error> {
        self.base_url
            .join(&format!("admin/{page}"))
            .map_err(Error::InvalidUrl)
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Authenticate against the admin UI.
    ///
    /// Form login; the implicit `ok` submit parameter is required or the
    /// firmware treats the post as a page load. The session cookie lands in
    /// the jar; the CSRF token comes back in a response header.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), Error> {
        let url = self.admin_url("login.jsp")?;
        debug!("logging in at {}", url);

        let form = [
            ("username", username),
            ("password", password.expose_secret()),
            ("ok", "Log In"),
        ];

        let resp = self
            .http
            .post(url)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("login failed (HTTP {status})"),
            });
        }

        if let Some(token) = resp
            .headers()
            .get("HTTP_X_CSRF_TOKEN")
            .or_else(|| resp.headers().get("X-CSRF-Token"))
            .and_then(|v| v.to_str().ok())
        {
            debug!("storing CSRF token");
            *self.csrf_token.write().expect("CSRF lock poisoned") = Some(token.to_owned());
        }

        debug!("login successful");
        Ok(())
    }

    /// Session initialization -- one `getstat` call the firmware requires
    /// before conf queries return data. Must follow `login`.
    pub async fn init_session(&self) -> Result<(), Error> {
        let url = self.admin_url("_cmdstat.jsp")?;
        debug!("initializing conf session at {}", url);

        let resp = self
            .send_xml(url, codec::session_init())
            .await?;
        trace!(bytes = resp.len(), "session init reply");

        self.session_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// End the admin session.
    pub async fn logout(&self) -> Result<(), Error> {
        let url = self.admin_url("logout.jsp")?;
        debug!("logging out at {}", url);

        let _resp = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(Error::Transport)?;

        self.session_ready.store(false, Ordering::Release);
        Ok(())
    }

    // ── Configuration reads ──────────────────────────────────────────

    /// Read the WLAN collection.
    pub async fn get_wlans(&self) -> Result<Vec<WlanEntry>, Error> {
        let body = self.conf(codec::getconf(codec::COMP_WLAN)).await?;
        Ok(codec::parse_wlans(&body))
    }

    /// Read the guest-service collection.
    pub async fn get_guest_services(&self) -> Result<Vec<GuestServiceEntry>, Error> {
        let body = self.conf(codec::getconf(codec::COMP_GUEST_SERVICE)).await?;
        Ok(codec::parse_guest_services(&body))
    }

    // ── Configuration writes ─────────────────────────────────────────

    /// Update a WLAN object. `key_ssid` must be the SSID the device
    /// currently knows -- it is the update key, even when renaming.
    ///
    /// A returned `Ok` only means the device *accepted* the envelope;
    /// callers that need the change to have taken effect must re-read the
    /// collection afterwards (see the coordinator's verification step).
    pub async fn update_wlan(&self, key_ssid: &str, conf: &WlanConf) -> Result<(), Error> {
        let body = self.conf(codec::wlan_update(key_ssid, conf)).await?;
        codec::expect_object_response(&body, codec::COMP_WLAN)
    }

    /// Create a WLAN object.
    pub async fn create_wlan(&self, conf: &WlanConf) -> Result<(), Error> {
        let body = self.conf(codec::wlan_create(conf)).await?;
        codec::expect_object_response(&body, codec::COMP_WLAN)
    }

    /// Delete a WLAN object by its server-assigned id.
    pub async fn delete_wlan(&self, id: &str) -> Result<(), Error> {
        let body = self.conf(codec::wlan_delete(id)).await?;
        codec::expect_object_response(&body, codec::COMP_WLAN)
    }

    /// Update a guest-service object (stable-id keyed).
    pub async fn update_guest_service(&self, conf: &GuestServiceConf) -> Result<(), Error> {
        let body = self.conf(codec::guest_service_update(conf)).await?;
        codec::expect_object_response(&body, codec::COMP_GUEST_SERVICE)
    }

    // ── Request plumbing ─────────────────────────────────────────────

    /// Post an ajax-request envelope to the conf endpoint.
    async fn conf(&self, envelope: String) -> Result<String, Error> {
        if !self.session_ready.load(Ordering::Acquire) {
            return Err(Error::SessionRequired);
        }
        let url = self.admin_url("_conf.jsp")?;
        self.send_xml(url, envelope).await
    }

    async fn send_xml(&self, url: Url, envelope: String) -> Result<String, Error> {
        trace!(%url, "conf call");

        let mut builder = self
            .http
            .post(url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(envelope);

        {
            let guard = self.csrf_token.read().expect("CSRF lock poisoned");
            if let Some(token) = guard.as_deref() {
                builder = builder.header("X-CSRF-Token", token);
            }
        }

        let resp = builder.send().await.map_err(Error::Transport)?;

        // The firmware may rotate the token mid-session.
        if let Some(token) = resp
            .headers()
            .get("HTTP_X_CSRF_TOKEN")
            .or_else(|| resp.headers().get("X-CSRF-Token"))
            .and_then(|v| v.to_str().ok())
        {
            trace!("CSRF token rotated");
            *self.csrf_token.write().expect("CSRF lock poisoned") = Some(token.to_owned());
        }

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            self.session_ready.store(false, Ordering::Release);
            return Err(Error::Authentication {
                message: format!("session rejected (HTTP {status})"),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::MalformedResponse {
                message: format!("HTTP {status}: {}", crate::error::body_preview(&body)),
            });
        }

        resp.text().await.map_err(Error::Transport)
    }
}
