//! Runtime validators over untrusted JSON values.
//!
//! Each predicate is total: any input yields `true` or `false`, never a
//! panic, and the input is only borrowed. A `true` result guarantees that
//! [`crate::decode_value`] narrows the value to the matching variant.

use pcapsync_core::is_config;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{Event, EventFamily};

/// Name of the discriminator field.
pub const TYPE_FIELD: &str = "Type";

/// Returns the discriminator if `value` is an object with a string `Type`.
pub fn discriminator(value: &Value) -> Option<&str> {
    value.as_object()?.get(TYPE_FIELD)?.as_str()
}

/// Envelope check: an object carrying a string `Type`.
///
/// The payload is deliberately not inspected here.
pub fn is_event(value: &Value) -> bool {
    discriminator(value).is_some()
}

/// Returns true if `value` is a fully valid event of `family`.
pub fn is_family(value: &Value, family: EventFamily) -> bool {
    match discriminator(value) {
        Some(event_type) if family.accepts(event_type) => narrow(value, family).is_ok(),
        _ => false,
    }
}

pub fn is_tag_event(value: &Value) -> bool {
    is_family(value, EventFamily::Tag)
}

pub fn is_converter_event(value: &Value) -> bool {
    is_family(value, EventFamily::Converter)
}

pub fn is_pcap_stats_event(value: &Value) -> bool {
    is_family(value, EventFamily::PcapStats)
}

pub fn is_config_event(value: &Value) -> bool {
    is_family(value, EventFamily::Config)
}

pub fn is_webhooks_event(value: &Value) -> bool {
    is_family(value, EventFamily::Webhooks)
}

pub fn is_pcap_over_ip_endpoints_event(value: &Value) -> bool {
    is_family(value, EventFamily::PcapOverIpEndpoints)
}

/// Checks the payload of a value whose discriminator `family` accepts and
/// narrows it to an [`Event`].
///
/// The `Config` payload goes through the configuration schema's own
/// predicate before the typed conversion.
pub(crate) fn narrow(value: &Value, family: EventFamily) -> Result<Event, String> {
    if family == EventFamily::Config {
        let field = family.payload_field();
        match value.get(field) {
            Some(payload) if is_config(payload) => {}
            Some(_) => return Err(format!("`{field}` rejected by the configuration schema")),
            None => return Err(format!("missing field `{field}`")),
        }
    }
    Event::deserialize(value).map_err(|e| e.to_string())
}
