// ── Batch reconciliation engine ──

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use guestgate_api::{CreateTokenRequest, PortalClient, TokenReport};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::convert::UsageSnapshot;
use crate::error::CoreError;
use crate::ledger::TokenLedger;
use crate::model::{SyncKind, SyncLog, SyncOutcome, Token, TokenStatus};
use crate::sync::classify::{classify_report, status_for_missing, Classification, DeviceStatus};

/// Hard cap on identifiers per reconciliation pass. The portal firmware
/// reads the whole request into a fixed buffer; anything larger gets
/// rejected here before a byte goes on the wire.
pub const MAX_BATCH_SIZE: usize = 20;

/// Result of one reconciliation pass.
///
/// `tokens` is positionally aligned with the requested identifiers;
/// `None` marks identifiers the ledger does not track for the
/// requesting tenant.
#[derive(Debug)]
pub struct BatchSyncReport {
    pub tokens: Vec<Option<Arc<Token>>>,
    /// Identifiers actually sent to the device (terminal and unknown
    /// tokens never leave the process).
    pub checked: u32,
    /// Tokens whose status advanced this pass.
    pub updated: u32,
}

/// Input for a completed point-of-sale purchase.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub tenant_id: Uuid,
    pub username: String,
    pub secret: String,
    pub wlan: String,
    pub valid_time_seconds: u64,
}

/// Reconciles ledger state against the portal appliance.
///
/// The ledger is always written *after* the device call: an unreachable
/// or failing device leaves local state untouched, so a later pass sees
/// the same picture and converges (re-running a sync against unchanged
/// device state is a no-op).
pub struct SyncEngine {
    ledger: Arc<TokenLedger>,
    portal: Arc<PortalClient>,
}

impl SyncEngine {
    pub fn new(ledger: Arc<TokenLedger>, portal: Arc<PortalClient>) -> Self {
        Self { ledger, portal }
    }

    pub fn ledger(&self) -> &Arc<TokenLedger> {
        &self.ledger
    }

    // ── Batch sync ───────────────────────────────────────────────────

    /// Reconcile up to [`MAX_BATCH_SIZE`] of one tenant's tokens in a
    /// single device round trip. Identifiers belonging to another tenant
    /// are treated exactly like unknown ones.
    ///
    /// Per-token reconciliation failures are tolerated: the failing
    /// token keeps its previous state, the rest of the batch lands, and
    /// the pass is logged as `Partial`. Only a failed device call aborts
    /// the whole pass.
    pub async fn sync_batch(
        &self,
        tenant_id: Uuid,
        identifiers: &[String],
    ) -> Result<BatchSyncReport, CoreError> {
        if identifiers.is_empty() {
            return Err(CoreError::Validation {
                message: "batch sync requires at least one identifier".into(),
            });
        }
        if identifiers.len() > MAX_BATCH_SIZE {
            return Err(CoreError::Validation {
                message: format!(
                    "batch of {} exceeds limit of {MAX_BATCH_SIZE}",
                    identifiers.len()
                ),
            });
        }

        let started = Instant::now();
        let visible = |id: &str| {
            self.ledger
                .get(id)
                .filter(|t| t.tenant_id == tenant_id)
        };

        // Terminal tokens are settled; unknown and foreign-tenant tokens
        // have nothing to reconcile against. None go to the device.
        let to_check: Vec<String> = identifiers
            .iter()
            .filter(|id| visible(id).is_some_and(|t| !t.status.is_terminal()))
            .cloned()
            .collect();

        if to_check.is_empty() {
            debug!("nothing reconcilable in batch, skipping device call");
            // Still one audit row per invocation.
            self.ledger.append_sync_log(SyncLog::record(
                SyncKind::BatchSync,
                0,
                0,
                SyncOutcome::Success,
                started.elapsed().as_millis() as u64,
            ));
            return Ok(BatchSyncReport {
                tokens: identifiers.iter().map(|id| visible(id)).collect(),
                checked: 0,
                updated: 0,
            });
        }

        let lookup = match self.portal.batch_lookup(&to_check).await {
            Ok(lookup) => lookup,
            Err(err) => {
                let core_err = CoreError::from(err);
                let outcome = match core_err {
                    CoreError::DeviceUnreachable { .. } => SyncOutcome::DeviceUnreachable,
                    _ => SyncOutcome::Failed,
                };
                self.ledger.append_sync_log(SyncLog::record(
                    SyncKind::BatchSync,
                    to_check.len() as u32,
                    0,
                    outcome,
                    started.elapsed().as_millis() as u64,
                ));
                return Err(core_err);
            }
        };

        let now = Utc::now();
        let mut updated = 0u32;
        let mut failed: Vec<&str> = Vec::new();

        for id in &to_check {
            let report = lookup.reports.iter().find(|r| r.identifier == *id);
            match self.reconcile_one(id, report, now) {
                Ok(advanced) => {
                    if advanced {
                        updated += 1;
                    }
                }
                Err(err) => {
                    warn!(token = %id, error = %err, "token reconciliation failed");
                    failed.push(id.as_str());
                }
            }
        }

        let outcome = if failed.is_empty() {
            SyncOutcome::Success
        } else {
            SyncOutcome::Partial
        };
        self.ledger.append_sync_log(SyncLog::record(
            SyncKind::BatchSync,
            to_check.len() as u32,
            updated,
            outcome,
            started.elapsed().as_millis() as u64,
        ));
        info!(
            checked = to_check.len(),
            updated,
            failed = failed.len(),
            "batch sync finished"
        );

        // Failed entries surface as `None`, same as unknown and
        // foreign-tenant identifiers: the caller gets no stale
        // "reconciled" view for them.
        let tokens = identifiers
            .iter()
            .map(|id| {
                if failed.contains(&id.as_str()) {
                    None
                } else {
                    visible(id)
                }
            })
            .collect();

        Ok(BatchSyncReport {
            tokens,
            checked: to_check.len() as u32,
            updated,
        })
    }

    /// Apply one device report (or its absence) to the ledger. Returns
    /// whether the token's status advanced.
    fn reconcile_one(
        &self,
        username: &str,
        report: Option<&TokenReport>,
        now: chrono::DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let current = self
            .ledger
            .get(username)
            .ok_or_else(|| CoreError::TokenNotFound {
                identifier: username.to_owned(),
            })?;

        let Some(report) = report else {
            self.ledger.touch_synced(username, now);
            return self.advance_gone(username, current.first_used_at);
        };

        match classify_report(report) {
            Classification::Found(DeviceStatus::Active) => {
                let usage = UsageSnapshot::from(report);
                let first_used = usage.first_seen.unwrap_or(now);
                let advanced = current.status != TokenStatus::Active;
                self.ledger.mark_active(username, first_used)?;
                self.ledger.apply_usage(username, &usage, now);
                self.ledger.observe_devices(username, &usage, now);
                Ok(advanced)
            }
            Classification::Found(DeviceStatus::Expired) => {
                let usage = UsageSnapshot::from(report);
                self.ledger.apply_usage(username, &usage, now);
                self.advance_gone(username, current.first_used_at.or(usage.first_seen))
            }
            Classification::Found(DeviceStatus::Unused) => {
                // Present and untouched on the device; nothing to move.
                self.ledger.touch_synced(username, now);
                Ok(false)
            }
            Classification::Missing => {
                self.ledger.touch_synced(username, now);
                self.advance_gone(username, current.first_used_at)
            }
        }
    }

    /// A token the device no longer honors: consumed ones expired,
    /// never-used ones were removed before activation.
    fn advance_gone(
        &self,
        username: &str,
        first_used_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<bool, CoreError> {
        match status_for_missing(first_used_at) {
            TokenStatus::Expired => {
                // Only ACTIVE tokens may expire. A consumed-but-not-yet-
                // activated record means the activation report was lost;
                // recover it before expiring.
                if let Some(used) = first_used_at {
                    let current =
                        self.ledger
                            .get(username)
                            .ok_or_else(|| CoreError::TokenNotFound {
                                identifier: username.to_owned(),
                            })?;
                    if current.status != TokenStatus::Active {
                        self.ledger.mark_active(username, used)?;
                    }
                }
                self.ledger.mark_expired(username)?;
            }
            status => {
                debug_assert_eq!(status, TokenStatus::Disabled);
                self.ledger.mark_disabled(username)?;
            }
        }
        Ok(true)
    }

    // ── Health check ─────────────────────────────────────────────────

    /// Lightweight liveness probe against the portal, logged like any
    /// other sync interaction.
    pub async fn health_check(&self) -> Result<(), CoreError> {
        let started = Instant::now();
        let result = self.portal.ping().await;
        let outcome = match &result {
            Ok(()) => SyncOutcome::Success,
            Err(err) if err.is_unreachable() => SyncOutcome::DeviceUnreachable,
            Err(_) => SyncOutcome::Failed,
        };
        self.ledger.append_sync_log(SyncLog::record(
            SyncKind::HealthCheck,
            0,
            0,
            outcome,
            started.elapsed().as_millis() as u64,
        ));
        result.map_err(CoreError::from)
    }

    // ── Sale / admin entry points ────────────────────────────────────

    /// Complete a purchase: provision the credential on the device
    /// first, then record the sale locally. If the device call fails the
    /// ledger is untouched and the sale can be retried.
    pub async fn complete_sale(&self, sale: NewSale) -> Result<Arc<Token>, CoreError> {
        let now = Utc::now();
        let request = CreateTokenRequest {
            token: sale.username.clone(),
            secret: sale.secret.clone(),
            valid_time_seconds: sale.valid_time_seconds,
        };
        let device_view = self.portal.create_token(&request).await?;

        // Pre-provisioned pools hold the token as AVAILABLE already;
        // everything else is a fresh registration.
        let token = if self.ledger.get(&sale.username).is_some() {
            self.ledger.mark_sold(&sale.username, now)?
        } else {
            let mut token = Token::new(sale.tenant_id, sale.username, sale.secret, sale.wlan);
            token.valid_time_seconds = sale.valid_time_seconds;
            token.status = TokenStatus::Sold;
            token.sold_at = Some(now);
            self.ledger.register(token)?
        };

        if let Some(report) = device_view {
            let usage = UsageSnapshot::from(&report);
            self.ledger.apply_usage(&token.username, &usage, now);
        }
        self.ledger
            .get(&token.username)
            .ok_or_else(|| CoreError::TokenNotFound {
                identifier: token.username.clone(),
            })
    }

    /// Void a token. The ledger transition is authoritative; the portal
    /// disable is best-effort so an offline appliance cannot block an
    /// administrative void (the next sync pass converges either way).
    pub async fn invalidate(&self, username: &str) -> Result<Arc<Token>, CoreError> {
        let token = self.ledger.invalidate(username)?;
        if let Err(err) = self.portal.disable_token(username).await {
            warn!(token = username, error = %err, "portal disable failed, token voided locally");
        }
        Ok(token)
    }

    /// Extend a token's validity window. Device first; the local expiry
    /// hint moves only after the device accepts.
    pub async fn extend(
        &self,
        username: &str,
        extra_seconds: u64,
    ) -> Result<Arc<Token>, CoreError> {
        let current = self
            .ledger
            .get(username)
            .ok_or_else(|| CoreError::TokenNotFound {
                identifier: username.to_owned(),
            })?;
        if current.is_terminal() {
            return Err(CoreError::Validation {
                message: format!("token {username} is {} and cannot be extended", current.status),
            });
        }

        self.portal.extend_token(username, extra_seconds).await?;

        self.ledger
            .extend_validity(username, extra_seconds)
            .ok_or_else(|| CoreError::TokenNotFound {
                identifier: username.to_owned(),
            })
    }
}
