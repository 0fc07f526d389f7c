//! Error types for the SOAP client

use std::fmt;
use thiserror::Error;

/// Coarse classification of a transport-level failure.
///
/// The subscription layer keys its recovery policy off this value, so the
/// client maps the underlying I/O error kind onto it instead of leaving the
/// caller to pick apart error strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkErrorKind {
    /// The remote host actively refused the TCP connection
    ConnectionRefused,
    /// The host could not be reached (DNS, routing, reset)
    Unreachable,
    /// Connect or read timed out
    Timeout,
    /// Anything else the transport reported
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkErrorKind::ConnectionRefused => "connection refused",
            NetworkErrorKind::Unreachable => "host unreachable",
            NetworkErrorKind::Timeout => "timed out",
            NetworkErrorKind::Other => "transport failure",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during SOAP communication
#[derive(Debug, Clone, Error)]
pub enum SoapError {
    /// Network or connection level failure; no HTTP response was received
    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// The device answered with a status other than 200
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// XML parsing error or unexpected envelope shape
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// SOAP fault returned by the server
    #[error("SOAP fault: error code {0}")]
    Fault(u16),

    /// A SUBSCRIBE succeeded at the HTTP level but carried no SID header
    #[error("Missing SID header in SUBSCRIBE response")]
    MissingSid,
}

impl SoapError {
    /// Shorthand for a network error of the given kind.
    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        SoapError::Network {
            kind,
            message: message.into(),
        }
    }

    /// Returns the transport classification when this is a network failure.
    pub fn network_kind(&self) -> Option<NetworkErrorKind> {
        match self {
            SoapError::Network { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_kind_only_for_network_errors() {
        let refused = SoapError::network(NetworkErrorKind::ConnectionRefused, "refused");
        assert_eq!(refused.network_kind(), Some(NetworkErrorKind::ConnectionRefused));

        let http = SoapError::Http {
            status: 500,
            body: "oops".to_string(),
        };
        assert_eq!(http.network_kind(), None);
        assert_eq!(SoapError::MissingSid.network_kind(), None);
    }

    #[test]
    fn test_error_display() {
        let err = SoapError::network(NetworkErrorKind::Timeout, "read timed out");
        assert_eq!(err.to_string(), "Network error (timed out): read timed out");

        let err = SoapError::Http {
            status: 412,
            body: "Precondition Failed".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 412: Precondition Failed");
        assert_eq!(SoapError::Fault(401).to_string(), "SOAP fault: error code 401");
    }
}
