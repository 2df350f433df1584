//! Shared configuration for the guest-WiFi tools.
//!
//! TOML profiles, credential resolution (env + plaintext), and
//! translation to `guestgate_api::TransportConfig` and
//! `guestgate_core::ScanOptions`. A profile pairs the two appliances a
//! venue runs: the ESP32 portal and the Ruckus access point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use guestgate_api::{TlsMode, TransportConfig};
use guestgate_core::ScanOptions;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults shared by all profiles.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named venue profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Deadline for interactive single-token lookups, in seconds.
    #[serde(default = "default_interactive_timeout")]
    pub interactive_timeout: u64,

    /// Deadline for batch lookups and configuration writes, in seconds.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout: u64,

    #[serde(default)]
    pub scan: ScanTuning,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            interactive_timeout: default_interactive_timeout(),
            batch_timeout: default_batch_timeout(),
            scan: ScanTuning::default(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_interactive_timeout() -> u64 {
    5
}
fn default_batch_timeout() -> u64 {
    30
}

/// Scanner input tuning. Defaults match typical USB wedge scanners.
#[derive(Debug, Deserialize, Serialize)]
pub struct ScanTuning {
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_dedupe_secs")]
    pub dedupe_secs: u64,

    #[serde(default = "default_key_gap_ms")]
    pub key_gap_ms: u64,
}

impl Default for ScanTuning {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            debounce_ms: default_debounce_ms(),
            dedupe_secs: default_dedupe_secs(),
            key_gap_ms: default_key_gap_ms(),
        }
    }
}

fn default_min_length() -> usize {
    4
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_dedupe_secs() -> u64 {
    3
}
fn default_key_gap_ms() -> u64 {
    80
}

/// Retry policy for scheduled sync passes. Reconciliation itself never
/// retries inside a pass; the scheduler re-runs whole passes.
#[derive(Debug, Deserialize, Serialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_secs() -> u64 {
    5
}

/// A named venue profile: one portal, one access point.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    pub portal: PortalSettings,
    pub ruckus: RuckusSettings,
}

/// ESP32 portal endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct PortalSettings {
    /// Base URL (e.g., "http://10.0.0.10").
    pub url: String,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid TLS certificates.
    pub insecure: Option<bool>,
}

/// Ruckus R710 admin endpoint.
#[derive(Debug, Deserialize, Serialize)]
pub struct RuckusSettings {
    /// Base URL (e.g., "https://10.0.0.2").
    pub url: String,

    /// Admin username.
    pub username: Option<String>,

    /// Admin password (plaintext -- prefer the env var).
    pub password: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid TLS certificates. Defaults to true; the R710's web
    /// UI ships self-signed.
    pub insecure: Option<bool>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "guestgate", "guestgate").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("guestgate");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file path (still merged with env vars).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GUESTGATE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Look up a profile, falling back to `default_profile`.
pub fn select_profile<'a>(
    config: &'a Config,
    name: Option<&'a str>,
) -> Result<(&'a str, &'a Profile), ConfigError> {
    let name = name
        .or(config.default_profile.as_deref())
        .ok_or_else(|| ConfigError::UnknownProfile("<none>".into()))?;
    let profile = config
        .profiles
        .get(name)
        .ok_or_else(|| ConfigError::UnknownProfile(name.to_owned()))?;
    Ok((name, profile))
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve R710 admin credentials: env vars win over plaintext config.
pub fn resolve_ruckus_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let username = profile
        .ruckus
        .username
        .clone()
        .or_else(|| std::env::var("GUESTGATE_RUCKUS_USERNAME").ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    if let Ok(pw) = std::env::var("GUESTGATE_RUCKUS_PASSWORD") {
        return Ok((username, SecretString::from(pw)));
    }

    if let Some(ref pw) = profile.ruckus.password {
        return Ok((username, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation to runtime types ────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

fn tls_mode(insecure: Option<bool>, ca_cert: Option<&PathBuf>, default_insecure: bool) -> TlsMode {
    if insecure.unwrap_or(default_insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(path) = ca_cert {
        TlsMode::CustomCa(path.clone())
    } else {
        TlsMode::System
    }
}

/// Portal base URL as a parsed `Url`.
pub fn portal_url(profile: &Profile) -> Result<Url, ConfigError> {
    parse_url("portal.url", &profile.portal.url)
}

/// Ruckus base URL as a parsed `Url`.
pub fn ruckus_url(profile: &Profile) -> Result<Url, ConfigError> {
    parse_url("ruckus.url", &profile.ruckus.url)
}

/// Transport settings for the portal client.
pub fn portal_transport(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    TransportConfig {
        tls: tls_mode(
            profile.portal.insecure,
            profile.portal.ca_cert.as_ref(),
            false,
        ),
        interactive_timeout: Duration::from_secs(defaults.interactive_timeout),
        batch_timeout: Duration::from_secs(defaults.batch_timeout),
        cookie_jar: None,
    }
}

/// Transport settings for the R710 client. The client adds its own
/// cookie jar; TLS verification defaults to off for this device.
pub fn ruckus_transport(profile: &Profile, defaults: &Defaults) -> TransportConfig {
    TransportConfig {
        tls: tls_mode(
            profile.ruckus.insecure,
            profile.ruckus.ca_cert.as_ref(),
            true,
        ),
        interactive_timeout: Duration::from_secs(defaults.interactive_timeout),
        batch_timeout: Duration::from_secs(defaults.batch_timeout),
        cookie_jar: None,
    }
}

/// Scanner pipeline options from the tuning section.
pub fn scan_options(defaults: &Defaults) -> ScanOptions {
    ScanOptions {
        min_length: defaults.scan.min_length,
        debounce: Duration::from_millis(defaults.scan.debounce_ms),
        dedupe_window: Duration::from_secs(defaults.scan.dedupe_secs),
        key_gap: Duration::from_millis(defaults.scan.key_gap_ms),
    }
}
