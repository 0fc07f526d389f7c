use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use soap_client::{envelope::child_text, Element, SoapClient};
use tracing::{debug, info};

use crate::bridge::{self, EndDevice, CAPABILITY_COLOR};
use crate::capability::CapabilityMap;
use crate::color::color_capability_value;
use crate::descriptor::EndpointDescriptor;
use crate::error::{ApiError, Result};
use crate::events::{parse_attribute_list, parse_binary_state, render_attribute_list, InsightParams};
use crate::service::{BASIC_EVENT, BRIDGE, DEVICE_EVENT, INSIGHT};

/// Current network address of an endpoint and whether it is answering.
///
/// Shared between the RPC path and subscription recovery. Recovery moves the
/// port when the device stops answering on the old one. Both paths latch a
/// transport failure here and clear it on the next success.
#[derive(Debug)]
pub struct EndpointAddress {
    inner: RwLock<(String, u16)>,
    failed: AtomicBool,
}

impl EndpointAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            inner: RwLock::new((host.into(), port)),
            failed: AtomicBool::new(false),
        }
    }

    /// True while the latest request to this address failed below HTTP
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn mark_failed(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    pub fn mark_reachable(&self) {
        self.failed.store(false, Ordering::SeqCst);
    }

    /// `(host, port)` as of now
    pub fn get(&self) -> (String, u16) {
        self.inner.read().clone()
    }

    pub fn host(&self) -> String {
        self.inner.read().0.clone()
    }

    pub fn port(&self) -> u16 {
        self.inner.read().1
    }

    pub fn set_port(&self, port: u16) {
        self.inner.write().1 = port;
    }

    /// Move to the other of two candidate ports and return the new port.
    ///
    /// A port equal to the first candidate becomes the second; anything else
    /// becomes the first.
    pub fn toggle_port(&self, candidates: (u16, u16)) -> u16 {
        let mut guard = self.inner.write();
        let next = if guard.1 == candidates.0 {
            candidates.1
        } else {
            candidates.0
        };
        info!(host = %guard.0, from = guard.1, to = next, "Switching endpoint port");
        guard.1 = next;
        next
    }
}

/// Control-channel client bound to one endpoint.
///
/// Every operation checks that the endpoint advertises the service it needs,
/// posts a SOAP envelope to that service's control path and decodes the
/// `<Action>Response` element. Calls are blocking.
///
/// # Example
/// ```rust,ignore
/// use wemo_api::{DeviceClient, EndpointDescriptor};
///
/// let client = DeviceClient::new(descriptor);
/// client.set_binary_state(1)?;
/// assert_eq!(client.get_binary_state()?, 1);
/// ```
#[derive(Debug, Clone)]
pub struct DeviceClient {
    descriptor: Arc<EndpointDescriptor>,
    address: Arc<EndpointAddress>,
    soap: SoapClient,
}

impl DeviceClient {
    /// Create a client with its own address cell and default timeouts
    pub fn new(descriptor: EndpointDescriptor) -> Self {
        let address = Arc::new(EndpointAddress::new(descriptor.host.clone(), descriptor.port));
        Self::with_parts(Arc::new(descriptor), address, SoapClient::new())
    }

    /// Create a client sharing an address cell and SOAP client with others
    pub fn with_parts(
        descriptor: Arc<EndpointDescriptor>,
        address: Arc<EndpointAddress>,
        soap: SoapClient,
    ) -> Self {
        Self {
            descriptor,
            address,
            soap,
        }
    }

    pub fn descriptor(&self) -> &EndpointDescriptor {
        &self.descriptor
    }

    pub fn address(&self) -> &Arc<EndpointAddress> {
        &self.address
    }

    /// Invoke an arbitrary action and return its response element.
    ///
    /// # Errors
    /// * [`ApiError::UnsupportedService`] if the endpoint lacks `service_type`
    /// * [`ApiError::Transport`] for network failures; these also mark the
    ///   shared [`EndpointAddress`] as failed until the next success
    /// * [`ApiError::HttpStatus`] for non-200 replies that carry no SOAP fault
    /// * [`ApiError::Protocol`] for malformed envelopes and SOAP faults,
    ///   including faults delivered with HTTP 500
    pub fn soap_action(
        &self,
        service_type: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<Element> {
        let service = self.descriptor.require_service(service_type)?;
        let (host, port) = self.address.get();

        debug!(udn = %self.descriptor.udn, %service_type, %action, "Invoking action");

        let result = self.soap.call(
            &host,
            port,
            &service.control_path,
            service_type,
            action,
            args,
        );

        match result {
            Ok(response) => {
                self.address.mark_reachable();
                Ok(response)
            }
            Err(e) => {
                if e.network_kind().is_some() {
                    self.address.mark_failed();
                }
                Err(ApiError::from(e))
            }
        }
    }

    pub fn set_binary_state(&self, value: u8) -> Result<()> {
        let value = value.to_string();
        self.soap_action(BASIC_EVENT, "SetBinaryState", &[("BinaryState", &value)])?;
        Ok(())
    }

    pub fn get_binary_state(&self) -> Result<u8> {
        let response = self.soap_action(BASIC_EVENT, "GetBinaryState", &[])?;
        parse_binary_state(&required(&response, "BinaryState")?)
    }

    /// Set dimmer brightness; zero also switches the output off.
    pub fn set_brightness(&self, brightness: u8) -> Result<()> {
        let state = if brightness == 0 { "0" } else { "1" };
        let brightness = brightness.to_string();
        self.soap_action(
            BASIC_EVENT,
            "SetBinaryState",
            &[("BinaryState", state), ("brightness", &brightness)],
        )?;
        Ok(())
    }

    pub fn get_brightness(&self) -> Result<u8> {
        let response = self.soap_action(BASIC_EVENT, "GetBinaryState", &[])?;
        let raw = required(&response, "brightness")?;
        raw.trim()
            .parse()
            .map_err(|_| ApiError::protocol(format!("invalid brightness value '{raw}'")))
    }

    /// List the bulbs and groups paired with a bridge.
    pub fn get_end_devices(&self) -> Result<Vec<EndDevice>> {
        let udn = self.descriptor.udn.as_str();
        let response = self.soap_action(
            BRIDGE,
            "GetEndDevices",
            &[("DevUDN", udn), ("ReqListType", "PAIRED_LIST")],
        )?;
        let devices = bridge::parse_device_lists(&required(&response, "DeviceLists")?)?;
        debug!(%udn, count = devices.len(), "Parsed end devices");
        Ok(devices)
    }

    /// Current capability values of one bridge sub-device.
    pub fn get_device_status(&self, device_id: &str) -> Result<CapabilityMap> {
        let response = self.soap_action(BRIDGE, "GetDeviceStatus", &[("DeviceIDs", device_id)])?;
        bridge::parse_device_status(&required(&response, "DeviceStatusList")?)
    }

    /// Write one capability of a bridge sub-device or group.
    pub fn set_device_status(&self, device_id: &str, capability_id: &str, value: &str) -> Result<()> {
        let status = bridge::render_device_status(device_id, capability_id, value);
        self.soap_action(BRIDGE, "SetDeviceStatus", &[("DeviceStatusList", &status)])?;
        Ok(())
    }

    /// Write several capabilities in a single request.
    ///
    /// IDs and values are sent as positional comma-separated lists in the
    /// map's insertion order.
    pub fn set_device_statuses(&self, device_id: &str, capabilities: &CapabilityMap) -> Result<()> {
        if capabilities.is_empty() {
            return Err(ApiError::InvalidParameter(
                "at least one capability is required".to_string(),
            ));
        }
        let (ids, values) = capabilities.to_csv_pair();
        self.set_device_status(device_id, &ids, &values)
    }

    pub fn set_light_color(&self, device_id: &str, red: u8, green: u8, blue: u8) -> Result<()> {
        let value = color_capability_value(red, green, blue);
        self.set_device_status(device_id, CAPABILITY_COLOR, &value)
    }

    /// Attribute name/value pairs (Maker, Humidifier, Heater).
    pub fn get_attributes(&self) -> Result<Vec<(String, String)>> {
        let response = self.soap_action(DEVICE_EVENT, "GetAttributes", &[])?;
        let attributes = parse_attribute_list(&required(&response, "attributeList")?)?;
        Ok(attributes.into_iter().map(|a| (a.name, a.value)).collect())
    }

    pub fn set_attributes(&self, attributes: &[(&str, &str)]) -> Result<()> {
        let list = render_attribute_list(attributes);
        self.soap_action(DEVICE_EVENT, "SetAttributes", &[("attributeList", &list)])?;
        Ok(())
    }

    pub fn get_insight_params(&self) -> Result<InsightParams> {
        let response = self.soap_action(INSIGHT, "GetInsightParams", &[])?;
        InsightParams::parse(&required(&response, "InsightParams")?)
    }
}

fn required(response: &Element, name: &str) -> Result<String> {
    child_text(response, name)
        .ok_or_else(|| ApiError::protocol(format!("response is missing {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_port_between_candidates() {
        let address = EndpointAddress::new("192.168.1.20", 49152);
        assert_eq!(address.toggle_port((49152, 49153)), 49153);
        assert_eq!(address.toggle_port((49152, 49153)), 49152);
    }

    #[test]
    fn test_toggle_port_from_unknown_port() {
        let address = EndpointAddress::new("192.168.1.20", 8080);
        assert_eq!(address.toggle_port((49152, 49153)), 49152);
        assert_eq!(address.get(), ("192.168.1.20".to_string(), 49152));
    }

    #[test]
    fn test_failure_latch() {
        let address = EndpointAddress::new("192.168.1.20", 49153);
        assert!(!address.is_failed());
        address.mark_failed();
        assert!(address.is_failed());
        address.mark_reachable();
        assert!(!address.is_failed());
    }

    #[test]
    fn test_unsupported_service_names_endpoint() {
        let descriptor = EndpointDescriptor::new("uuid:Socket-1_0-221517K0101769", "127.0.0.1", 1);
        let client = DeviceClient::new(descriptor);

        match client.get_end_devices() {
            Err(ApiError::UnsupportedService {
                service_type,
                endpoint_id,
            }) => {
                assert_eq!(service_type, BRIDGE);
                assert_eq!(endpoint_id, "uuid:Socket-1_0-221517K0101769");
            }
            other => panic!("expected UnsupportedService, got {other:?}"),
        }
    }

    #[test]
    fn test_composite_write_requires_capabilities() {
        let descriptor = EndpointDescriptor::new("uuid:Bridge-1_0", "127.0.0.1", 1);
        let client = DeviceClient::new(descriptor);
        assert!(matches!(
            client.set_device_statuses("1432253402", &CapabilityMap::new()),
            Err(ApiError::InvalidParameter(_))
        ));
    }
}
