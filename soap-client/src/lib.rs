//! Private SOAP client for UPnP device communication
//!
//! This crate provides a minimal SOAP client for talking to UPnP appliances
//! such as WeMo switches and bridges. Besides control-channel actions it also
//! speaks the GENA subscription verbs (SUBSCRIBE / UNSUBSCRIBE) and fetches
//! device description documents.
//!
//! All calls are blocking; async callers should move them onto a blocking
//! thread.

pub mod envelope;
mod error;

pub use error::{NetworkErrorKind, SoapError};
pub use xmltree::Element;

use std::io;
use std::time::Duration;

use tracing::debug;

/// Response from a UPnP subscription or renewal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionResponse {
    /// Subscription ID returned by the device
    pub sid: String,
    /// Actual timeout granted by the device (in seconds)
    pub timeout_seconds: u32,
}

/// A minimal SOAP client for UPnP device communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
}

impl SoapClient {
    /// Create a new SOAP client with default timeouts (5s connect, 10s read)
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
    }

    /// Create a SOAP client with explicit connect and read timeouts
    pub fn with_timeouts(connect: Duration, read: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect)
                .timeout_read(read)
                .build(),
        }
    }

    /// Send a SOAP request and return the `<action>Response` element
    ///
    /// # Arguments
    /// * `host` / `port` - Device address
    /// * `control_path` - Control URL path from the service description
    /// * `service_type` - Service URN, used as namespace and in the SOAPACTION header
    /// * `action` - Action name
    /// * `args` - Ordered action arguments
    pub fn call(
        &self,
        host: &str,
        port: u16,
        control_path: &str,
        service_type: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<Element, SoapError> {
        let body = envelope::encode(service_type, action, args);
        let url = endpoint_url(host, port, control_path);
        let soap_action = format!("\"{service_type}#{action}\"");

        debug!(%url, %soap_action, "sending SOAP request");

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action)
            .send_string(&body)
            .map_err(|e| fault_or_status(map_ureq_error(e)))?;

        let xml_text = read_ok_body(response).map_err(fault_or_status)?;
        envelope::decode(&xml_text, action)
    }

    /// Subscribe to UPnP events for a specific service endpoint
    ///
    /// # Arguments
    /// * `host` / `port` - Device address
    /// * `event_path` - Event subscription path from the service description
    /// * `callback_url` - URL where events should be sent
    /// * `timeout_seconds` - Requested subscription timeout in seconds
    ///
    /// # Returns
    /// A `SubscriptionResponse` containing the SID and granted timeout. A 200
    /// response without a SID header yields [`SoapError::MissingSid`].
    pub fn subscribe(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let url = endpoint_url(host, port, event_path);

        debug!(%url, %callback_url, "sending SUBSCRIBE");

        let response = self
            .agent
            .request("SUBSCRIBE", &url)
            .set("HOST", &format!("{host}:{port}"))
            .set("CALLBACK", &format!("<{callback_url}>"))
            .set("NT", "upnp:event")
            .set("TIMEOUT", &format!("Second-{timeout_seconds}"))
            .call()
            .map_err(map_ureq_error)?;

        subscription_response(response, None, timeout_seconds)
    }

    /// Renew an existing UPnP subscription
    ///
    /// The device may hand back the same SID or omit it; in the latter case
    /// the existing SID is kept.
    pub fn renew_subscription(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let url = endpoint_url(host, port, event_path);

        debug!(%url, %sid, "renewing subscription");

        let response = self
            .agent
            .request("SUBSCRIBE", &url)
            .set("HOST", &format!("{host}:{port}"))
            .set("SID", sid)
            .set("TIMEOUT", &format!("Second-{timeout_seconds}"))
            .call()
            .map_err(map_ureq_error)?;

        subscription_response(response, Some(sid), timeout_seconds)
    }

    /// Unsubscribe from UPnP events
    pub fn unsubscribe(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        sid: &str,
    ) -> Result<(), SoapError> {
        let url = endpoint_url(host, port, event_path);

        debug!(%url, %sid, "sending UNSUBSCRIBE");

        let response = self
            .agent
            .request("UNSUBSCRIBE", &url)
            .set("HOST", &format!("{host}:{port}"))
            .set("SID", sid)
            .call()
            .map_err(map_ureq_error)?;

        read_ok_body(response).map(|_| ())
    }

    /// Fetch a document (typically the device description) with a plain GET
    pub fn fetch(&self, url: &str) -> Result<String, SoapError> {
        debug!(%url, "fetching document");

        let response = self.agent.get(url).call().map_err(map_ureq_error)?;
        read_ok_body(response)
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Join host, port and a service path into an absolute URL.
pub fn endpoint_url(host: &str, port: u16, path: &str) -> String {
    if path.starts_with('/') {
        format!("http://{host}:{port}{path}")
    } else {
        format!("http://{host}:{port}/{path}")
    }
}

fn read_ok_body(response: ureq::Response) -> Result<String, SoapError> {
    let status = response.status();
    let body = response.into_string().map_err(map_io_error)?;
    if status != 200 {
        return Err(SoapError::Http { status, body });
    }
    Ok(body)
}

/// Turn a non-200 reply whose body is a SOAP fault into [`SoapError::Fault`].
fn fault_or_status(error: SoapError) -> SoapError {
    match error {
        SoapError::Http { status, body } => match envelope::fault_code(&body) {
            Some(code) => SoapError::Fault(code),
            None => SoapError::Http { status, body },
        },
        other => other,
    }
}

fn subscription_response(
    response: ureq::Response,
    current_sid: Option<&str>,
    requested_timeout: u32,
) -> Result<SubscriptionResponse, SoapError> {
    let status = response.status();
    if status != 200 {
        let body = response.into_string().unwrap_or_default();
        return Err(SoapError::Http { status, body });
    }

    let sid = response
        .header("SID")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| current_sid.map(str::to_string))
        .ok_or(SoapError::MissingSid)?;

    let timeout_seconds = response
        .header("TIMEOUT")
        .and_then(parse_timeout_header)
        .unwrap_or(requested_timeout);

    Ok(SubscriptionResponse {
        sid,
        timeout_seconds,
    })
}

/// Parse a GENA `TIMEOUT` header value such as `Second-300`.
pub fn parse_timeout_header(value: &str) -> Option<u32> {
    value.trim().strip_prefix("Second-")?.parse::<u32>().ok()
}

fn map_ureq_error(error: ureq::Error) -> SoapError {
    match error {
        ureq::Error::Status(status, response) => SoapError::Http {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => {
            let kind = classify_transport(&transport);
            SoapError::network(kind, transport.to_string())
        }
    }
}

fn classify_transport(transport: &ureq::Transport) -> NetworkErrorKind {
    let io_kind = std::error::Error::source(transport)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .map(io::Error::kind);

    match io_kind {
        Some(io::ErrorKind::ConnectionRefused) => NetworkErrorKind::ConnectionRefused,
        Some(io::ErrorKind::TimedOut) | Some(io::ErrorKind::WouldBlock) => NetworkErrorKind::Timeout,
        _ => match transport.kind() {
            ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => {
                NetworkErrorKind::Unreachable
            }
            _ => NetworkErrorKind::Other,
        },
    }
}

fn map_io_error(error: io::Error) -> SoapError {
    let kind = match error.kind() {
        io::ErrorKind::ConnectionRefused => NetworkErrorKind::ConnectionRefused,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => NetworkErrorKind::Timeout,
        _ => NetworkErrorKind::Other,
    };
    SoapError::network(kind, error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soap_client_creation() {
        let _client = SoapClient::new();
        let _default_client = SoapClient::default();
        let _custom = SoapClient::with_timeouts(Duration::from_secs(1), Duration::from_secs(2));
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("192.168.1.20", 49153, "/upnp/control/basicevent1"),
            "http://192.168.1.20:49153/upnp/control/basicevent1"
        );
        assert_eq!(
            endpoint_url("192.168.1.20", 49153, "upnp/event/basicevent1"),
            "http://192.168.1.20:49153/upnp/event/basicevent1"
        );
    }

    #[test]
    fn test_parse_timeout_header() {
        assert_eq!(parse_timeout_header("Second-300"), Some(300));
        assert_eq!(parse_timeout_header(" Second-1800 "), Some(1800));
        assert_eq!(parse_timeout_header("infinite"), None);
        assert_eq!(parse_timeout_header("Second-abc"), None);
    }

    #[test]
    fn test_connection_refused_is_classified() {
        // Bind then drop a listener so the port is very likely closed
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client = SoapClient::with_timeouts(Duration::from_secs(2), Duration::from_secs(2));
        let err = client
            .call(
                "127.0.0.1",
                port,
                "/upnp/control/basicevent1",
                "urn:Belkin:service:basicevent:1",
                "GetBinaryState",
                &[],
            )
            .unwrap_err();

        assert_eq!(err.network_kind(), Some(NetworkErrorKind::ConnectionRefused));
    }
}
