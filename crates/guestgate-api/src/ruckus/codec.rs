// ajax-request codec for the R710 conf API.
//
// Builds the `<ajax-request>` envelopes and configuration objects the
// appliance expects, and classifies its responses. Two firmware quirks
// shape everything here:
//
// 1. Success is signaled by a self-closing `<response type="object">` tag
//    in the body, never by HTTP status.
// 2. WLAN writes must echo a fixed set of nested elements (qos, rrm,
//    schedule mask, queue priorities). Leave one out and the device
//    returns a success envelope while silently dropping the write.

use chrono::Utc;
use uuid::Uuid;

use crate::error::Error;
use crate::ruckus::models::{GuestServiceConf, GuestServiceEntry, WlanConf, WlanEntry};
use crate::ruckus::xml::{elements_named, escape, first_element};

/// Component name for the WLAN collection.
pub const COMP_WLAN: &str = "wlansvc-list";
/// Component name for the guest-service collection.
pub const COMP_GUEST_SERVICE: &str = "guestservice-list";

/// Updater stamp: `<component>.<timestamp>.<random>` -- the firmware uses
/// it to discard stale UI requests, so every envelope gets a fresh one.
fn updater(comp: &str) -> String {
    let ts = Utc::now().timestamp_millis();
    let rand = Uuid::new_v4().simple().to_string();
    format!("{comp}.{ts}.{}", &rand[..8])
}

fn envelope(action: &str, comp: &str, inner: &str) -> String {
    format!(
        "<ajax-request action='{action}' updater='{}' comp='{comp}'>{inner}</ajax-request>",
        updater(comp)
    )
}

// ── Request builders ────────────────────────────────────────────────

/// Read a whole component collection.
pub fn getconf(comp: &str) -> String {
    format!(
        "<ajax-request action='getconf' DECRYPT_X='true' updater='{}' comp='{comp}'/>",
        updater(comp)
    )
}

/// Update a WLAN object, keyed by its *current* SSID.
///
/// `key_ssid` goes into the `id` attribute (the device's name-as-id
/// convention); `conf.ssid` is the value being set.
pub fn wlan_update(key_ssid: &str, conf: &WlanConf) -> String {
    envelope("updobj", COMP_WLAN, &wlan_object(Some(key_ssid), conf))
}

/// Create a new WLAN object (no update key).
pub fn wlan_create(conf: &WlanConf) -> String {
    envelope("addobj", COMP_WLAN, &wlan_object(None, conf))
}

/// Delete a WLAN object by its server-assigned id.
pub fn wlan_delete(id: &str) -> String {
    envelope(
        "delobj",
        COMP_WLAN,
        &format!("<wlansvc id='{}'/>", escape(id)),
    )
}

/// Update a guest-service object (stable id key).
pub fn guest_service_update(conf: &GuestServiceConf) -> String {
    envelope(
        "updobj",
        COMP_GUEST_SERVICE,
        &format!(
            "<guestservice id='{}' name='{}' title='{}' validity-period='{}' logo='{}' \
             show-tou='false' redirect-url=''/>",
            escape(&conf.id),
            escape(&conf.name),
            escape(&conf.title),
            conf.validity_seconds,
            escape(&conf.logo),
        ),
    )
}

/// Session-initialization call body. One `getstat` against the system
/// component must precede any conf query or the device returns empty data.
pub fn session_init() -> String {
    format!(
        "<ajax-request action='getstat' updater='{}' comp='system'><sysinfo/></ajax-request>",
        updater("system")
    )
}

/// Serialize a WLAN object with every element the device schema requires.
fn wlan_object(key_ssid: Option<&str>, conf: &WlanConf) -> String {
    // Update key: old SSID for updates, server id when we have one.
    let id_attr = match (key_ssid, conf.id.as_deref()) {
        (Some(key), _) => format!(" id='{}'", escape(key)),
        (None, Some(id)) => format!(" id='{}'", escape(id)),
        (None, None) => String::new(),
    };

    format!(
        "<wlansvc{id_attr} name='{ssid}' ssid='{ssid}' description='{desc}' \
         usage='guest' guest-service-id='{gs}' is-guest='true' \
         guestpass-key-format='{fmt}' client-isolation='{iso}' max-clients-per-radio='{max}' \
         enable-type='0' authentication='open' encryption='none' acctsvr-id='0' authsvr-id='0' \
         do-802-11d='disabled' sta-info-extraction='1' dvlan='false' option82='false' \
         force-dhcp='false' dis-dgaf='false' parp='false' authstats='false'>\
         <qos uplink-preset='DISABLE' downlink-preset='DISABLE' perssid-uplink='0' \
         perssid-downlink='0'/>\
         <rrm neighbor-report='disabled'/>\
         <wlan-schedule value='0x0:0x0:0x0:0x0:0x0:0x0:0x0'/>\
         <queue-priority voice='0' video='2' data='4' background='6'/>\
         <smartcast-profile mcast-filter='disabled'/>\
         </wlansvc>",
        ssid = escape(&conf.ssid),
        desc = escape(&conf.description),
        gs = escape(&conf.guest_service_id),
        fmt = if conf.numeric_tokens { "number" } else { "alphanumeric" },
        iso = if conf.client_isolation { "full" } else { "none" },
        max = conf.max_clients,
    )
}

// ── Response classification ─────────────────────────────────────────

/// Require a write acknowledgement: `<response type="object">`.
///
/// Anything else -- an explicit error response, or a body with no response
/// tag at all -- is a rejected write. Note this only proves the device
/// *accepted* the envelope; whether the change took effect needs a
/// follow-up read (the coordinator's verification step).
pub fn expect_object_response(body: &str, component: &str) -> Result<(), Error> {
    let Some(response) = first_element(body, "response") else {
        return Err(Error::MalformedResponse {
            message: format!("no <response> tag in reply for {component}"),
        });
    };

    match response.attr("type") {
        Some("object") => Ok(()),
        Some(other) => Err(Error::DeviceRejected {
            component: component.to_owned(),
            message: response
                .attr("message")
                .map_or_else(|| format!("response type '{other}'"), str::to_owned),
        }),
        None => Err(Error::MalformedResponse {
            message: format!("<response> tag without type attribute for {component}"),
        }),
    }
}

/// Parse a `getconf` reply for the WLAN collection.
pub fn parse_wlans(body: &str) -> Vec<WlanEntry> {
    elements_named(body, "wlansvc")
        .into_iter()
        .filter_map(|el| {
            Some(WlanEntry {
                id: el.attr("id")?.to_owned(),
                name: el.attr("name")?.to_owned(),
                ssid: el.attr("ssid").or(el.attr("name"))?.to_owned(),
            })
        })
        .collect()
}

/// Parse a `getconf` reply for the guest-service collection.
pub fn parse_guest_services(body: &str) -> Vec<GuestServiceEntry> {
    elements_named(body, "guestservice")
        .into_iter()
        .filter_map(|el| {
            Some(GuestServiceEntry {
                id: el.attr("id")?.to_owned(),
                name: el.attr("name")?.to_owned(),
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_wlan() -> WlanConf {
        WlanConf {
            id: Some("3".into()),
            ssid: "Guest WiFi".into(),
            description: "guest network".into(),
            guest_service_id: "1".into(),
            numeric_tokens: true,
            client_isolation: true,
            max_clients: 60,
        }
    }

    #[test]
    fn update_keys_on_old_ssid() {
        let mut conf = sample_wlan();
        conf.ssid = "New Name".into();
        let xml = wlan_update("Guest WiFi", &conf);

        // Old SSID is the update key; new SSID is the value being set.
        assert!(xml.contains("id='Guest WiFi'"));
        assert!(xml.contains("ssid='New Name'"));
        assert!(xml.contains("name='New Name'"));
        assert!(xml.contains("action='updobj'"));
        assert!(xml.contains("comp='wlansvc-list'"));
    }

    #[test]
    fn wlan_write_carries_mandatory_children() {
        let xml = wlan_update("Guest WiFi", &sample_wlan());
        for required in ["<qos ", "<rrm ", "<wlan-schedule ", "<queue-priority "] {
            assert!(xml.contains(required), "missing {required} in {xml}");
        }
    }

    #[test]
    fn create_omits_update_key() {
        let mut conf = sample_wlan();
        conf.id = None;
        let xml = wlan_create(&conf);
        assert!(!xml.contains(" id="));
        assert!(xml.contains("action='addobj'"));
    }

    #[test]
    fn object_response_accepted() {
        let body = "<ajax-response><response type=\"object\" id=\"3\"/></ajax-response>";
        expect_object_response(body, COMP_WLAN).unwrap();
    }

    #[test]
    fn error_response_rejected() {
        let body = "<ajax-response><response type=\"error\" message=\"invalid ssid\"/></ajax-response>";
        let err = expect_object_response(body, COMP_WLAN).unwrap_err();
        assert!(matches!(err, Error::DeviceRejected { .. }));
    }

    #[test]
    fn missing_response_tag_is_malformed() {
        let err = expect_object_response("<html>login page</html>", COMP_WLAN).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn parses_wlan_collection() {
        let body = "<ajax-response><response type='object'>\
                    <wlansvc id='1' name='Guest WiFi' ssid='Guest WiFi'/>\
                    <wlansvc id='2' name='Staff' ssid='Staff'/>\
                    </response></ajax-response>";
        let wlans = parse_wlans(body);
        assert_eq!(wlans.len(), 2);
        assert_eq!(wlans[0].ssid, "Guest WiFi");
    }
}
