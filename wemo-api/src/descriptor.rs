//! Endpoint description parsing.
//!
//! This module turns the UPnP description document served by a WeMo device
//! (`setup.xml`) into an [`EndpointDescriptor`].

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::service::{DeviceType, ServiceDescriptor, BRIDGE};

/// UPnP device description root element.
#[derive(Debug, Deserialize)]
struct Root {
    device: DeviceDescription,
}

/// Device description as it appears in the XML document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceDescription {
    device_type: String,
    friendly_name: String,
    model_name: Option<String>,
    serial_number: Option<String>,
    firmware_version: Option<String>,
    mac_address: Option<String>,
    #[serde(rename = "UDN")]
    udn: String,
    #[serde(default)]
    service_list: ServiceList,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceList {
    #[serde(rename = "service", default)]
    services: Vec<ServiceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceEntry {
    service_type: String,
    #[serde(default)]
    service_id: String,
    #[serde(rename = "controlURL")]
    control_url: String,
    #[serde(rename = "eventSubURL")]
    event_sub_url: String,
}

/// Everything needed to talk to one physical endpoint.
///
/// The identifier (`udn`) is stable across restarts. `host`/`port` are where
/// the endpoint was found; the port can move later, which is tracked by
/// [`EndpointAddress`](crate::EndpointAddress) rather than here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub udn: String,
    pub device_type: DeviceType,
    pub friendly_name: String,
    pub model_name: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub mac_address: Option<String>,
    pub host: String,
    pub port: u16,
    /// Base URL of the local notification listener, without the identifier
    pub callback_url: Option<String>,
    services: BTreeMap<String, ServiceDescriptor>,
}

impl EndpointDescriptor {
    /// Create a descriptor with no services.
    pub fn new(udn: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            udn: udn.into(),
            device_type: DeviceType::Other(String::new()),
            friendly_name: String::new(),
            model_name: None,
            serial_number: None,
            firmware_version: None,
            mac_address: None,
            host: host.into(),
            port,
            callback_url: None,
            services: BTreeMap::new(),
        }
    }

    /// Parse a description document fetched from `host:port`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Protocol` if the XML is malformed or missing required fields.
    pub fn from_setup_xml(xml: &str, host: impl Into<String>, port: u16) -> Result<Self> {
        let root: Root = quick_xml::de::from_str(xml)
            .map_err(|e| ApiError::protocol(format!("Failed to parse device XML: {e}")))?;
        let device = root.device;

        let mut descriptor = Self::new(device.udn, host, port);
        descriptor.device_type = DeviceType::from_urn(&device.device_type);
        descriptor.friendly_name = device.friendly_name;
        descriptor.model_name = device.model_name;
        descriptor.serial_number = device.serial_number;
        descriptor.firmware_version = device.firmware_version;
        descriptor.mac_address = device.mac_address;

        for entry in device.service_list.services {
            descriptor = descriptor.with_service(ServiceDescriptor {
                service_type: entry.service_type,
                service_id: entry.service_id,
                control_path: entry.control_url,
                event_path: entry.event_sub_url,
            });
        }

        Ok(descriptor)
    }

    /// Add or replace a service, keyed by its service type.
    pub fn with_service(mut self, service: ServiceDescriptor) -> Self {
        self.services.insert(service.service_type.clone(), service);
        self
    }

    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    pub fn service(&self, service_type: &str) -> Option<&ServiceDescriptor> {
        self.services.get(service_type)
    }

    /// Look a service up, failing with `UnsupportedService` when it is absent.
    pub fn require_service(&self, service_type: &str) -> Result<&ServiceDescriptor> {
        self.service(service_type)
            .ok_or_else(|| ApiError::UnsupportedService {
                service_type: service_type.to_string(),
                endpoint_id: self.udn.clone(),
            })
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    /// Bridge endpoints multiplex virtual sub-devices behind the bridge service.
    pub fn is_bridge(&self) -> bool {
        self.services.contains_key(BRIDGE)
    }
}
