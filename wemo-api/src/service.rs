//! Service types, event channels and device kinds exposed by WeMo endpoints.

use std::fmt;

/// Basic event service: on/off state, brightness, attribute changes
pub const BASIC_EVENT: &str = "urn:Belkin:service:basicevent:1";
/// Bridge service: virtual sub-devices (bulbs and groups)
pub const BRIDGE: &str = "urn:Belkin:service:bridge:1";
/// Insight metering service
pub const INSIGHT: &str = "urn:Belkin:service:insight:1";
/// Device event service: attribute lists on Maker, Humidifier, Heater
pub const DEVICE_EVENT: &str = "urn:Belkin:service:deviceevent:1";

/// A service advertised in the endpoint's description document.
///
/// Keyed by `service_type` inside an [`EndpointDescriptor`](crate::EndpointDescriptor);
/// service types are unique per endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Service URN, used as the SOAP namespace and RPC target selector
    pub service_type: String,
    /// Service identifier from the description document
    pub service_id: String,
    /// Path for control (SOAP) requests
    pub control_path: String,
    /// Path for GENA subscription requests
    pub event_path: String,
}

/// Named event channels a caller can ask to keep subscribed.
///
/// Each channel maps to exactly one service type; several channels share the
/// basic event service and therefore a single subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    /// On/off state changes
    BinaryState,
    /// Dimmer brightness changes
    Brightness,
    /// Attribute list changes (Maker, Humidifier, Heater)
    AttributeList,
    /// Capability changes on bridge sub-devices
    StatusChange,
    /// Insight power metering updates
    InsightParams,
}

impl EventChannel {
    /// All known channels
    pub const ALL: [EventChannel; 5] = [
        EventChannel::BinaryState,
        EventChannel::Brightness,
        EventChannel::AttributeList,
        EventChannel::StatusChange,
        EventChannel::InsightParams,
    ];

    /// Service type whose event subscription feeds this channel
    pub fn service_type(&self) -> &'static str {
        match self {
            EventChannel::BinaryState => BASIC_EVENT,
            EventChannel::Brightness => BASIC_EVENT,
            EventChannel::AttributeList => BASIC_EVENT,
            EventChannel::StatusChange => BRIDGE,
            EventChannel::InsightParams => INSIGHT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventChannel::BinaryState => "binaryState",
            EventChannel::Brightness => "brightness",
            EventChannel::AttributeList => "attributeList",
            EventChannel::StatusChange => "statusChange",
            EventChannel::InsightParams => "insightParams",
        }
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of physical endpoint, parsed from the `deviceType` URN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Bridge,
    Switch,
    Motion,
    Maker,
    Insight,
    LightSwitch,
    Dimmer,
    Humidifier,
    HeaterB,
    Other(String),
}

impl DeviceType {
    pub fn from_urn(urn: &str) -> Self {
        match urn {
            "urn:Belkin:device:bridge:1" => DeviceType::Bridge,
            "urn:Belkin:device:controllee:1" => DeviceType::Switch,
            "urn:Belkin:device:sensor:1" => DeviceType::Motion,
            "urn:Belkin:device:Maker:1" => DeviceType::Maker,
            "urn:Belkin:device:insight:1" => DeviceType::Insight,
            "urn:Belkin:device:lightswitch:1" => DeviceType::LightSwitch,
            "urn:Belkin:device:dimmer:1" => DeviceType::Dimmer,
            "urn:Belkin:device:Humidifier:1" => DeviceType::Humidifier,
            "urn:Belkin:device:HeaterB:1" => DeviceType::HeaterB,
            other => DeviceType::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_service_table() {
        assert_eq!(EventChannel::BinaryState.service_type(), BASIC_EVENT);
        assert_eq!(EventChannel::Brightness.service_type(), BASIC_EVENT);
        assert_eq!(EventChannel::AttributeList.service_type(), BASIC_EVENT);
        assert_eq!(EventChannel::StatusChange.service_type(), BRIDGE);
        assert_eq!(EventChannel::InsightParams.service_type(), INSIGHT);
    }

    #[test]
    fn test_device_type_from_urn() {
        assert_eq!(DeviceType::from_urn("urn:Belkin:device:bridge:1"), DeviceType::Bridge);
        assert_eq!(DeviceType::from_urn("urn:Belkin:device:insight:1"), DeviceType::Insight);
        assert_eq!(
            DeviceType::from_urn("urn:Belkin:device:Crockpot:1"),
            DeviceType::Other("urn:Belkin:device:Crockpot:1".to_string())
        );
    }
}
