// ── Configuration update coordinator ──
//
// Drives the three-step write protocol against the R710: guest service
// first, then the WLAN, then a read-back. The device acknowledges conf
// writes it silently ignores (a missing mandatory child element yields a
// clean success response and no change), so an acknowledged write is not
// a confirmed one. Only the verification read decides.

use std::sync::Arc;

use guestgate_api::{GuestServiceConf, RuckusClient, WlanConf};
use tracing::{debug, info};

use crate::error::CoreError;
use crate::model::WlanChange;

pub struct ConfigUpdateCoordinator {
    ruckus: Arc<RuckusClient>,
}

impl ConfigUpdateCoordinator {
    pub fn new(ruckus: Arc<RuckusClient>) -> Self {
        Self { ruckus }
    }

    /// Apply a WLAN + guest-service change and confirm it took.
    ///
    /// Ordering matters: the guest service must exist in its final shape
    /// before the WLAN references it. The WLAN write is keyed on the
    /// SSID the device currently knows, which is how renames work.
    ///
    /// Returns [`CoreError::ConfigUnverified`] when both writes are
    /// acknowledged but the read-back does not show the new SSID; callers
    /// must not persist the change as confirmed on that outcome.
    pub async fn apply(&self, change: &WlanChange) -> Result<(), CoreError> {
        let settings = &change.settings;

        let guest_service = GuestServiceConf {
            id: settings.guest_service.id.clone(),
            // The service object is named after its WLAN by convention.
            name: settings.ssid.clone(),
            title: settings.guest_service.title.clone(),
            validity_seconds: settings.guest_service.validity_seconds,
            logo: settings.guest_service.logo.clone(),
        };
        debug!(service = %guest_service.id, "updating guest service");
        self.ruckus.update_guest_service(&guest_service).await?;

        let wlan = WlanConf {
            id: None,
            ssid: settings.ssid.clone(),
            description: settings.description.clone(),
            guest_service_id: settings.guest_service.id.clone(),
            numeric_tokens: settings.numeric_tokens,
            client_isolation: settings.client_isolation,
            max_clients: settings.max_clients,
        };
        debug!(
            key = %change.current_ssid,
            ssid = %settings.ssid,
            "updating WLAN"
        );
        self.ruckus.update_wlan(&change.current_ssid, &wlan).await?;

        // Read-back: the new SSID must exist and the object name must
        // have followed the rename.
        let wlans = self.ruckus.get_wlans().await?;
        let confirmed = wlans
            .iter()
            .any(|w| w.ssid == settings.ssid && w.name == settings.ssid);
        if !confirmed {
            return Err(CoreError::ConfigUnverified {
                expected_ssid: settings.ssid.clone(),
            });
        }

        info!(ssid = %settings.ssid, "configuration change confirmed");
        Ok(())
    }
}
