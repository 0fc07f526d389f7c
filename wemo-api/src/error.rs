use soap_client::{NetworkErrorKind, SoapError};
use thiserror::Error;

/// High-level API errors for WeMo operations
///
/// Errors from a control-channel call are returned to the caller as-is.
/// Subscription maintenance never surfaces these; it reports through the
/// endpoint's event stream instead.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Connection refused, host unreachable or timed out
    ///
    /// No HTTP response was received from the device.
    #[error("Transport error ({kind}): {message}")]
    Transport {
        kind: NetworkErrorKind,
        message: String,
    },

    /// The device answered the control request with a status other than 200
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Malformed or mismatched response envelope, SOAP fault, or an embedded
    /// document that could not be parsed
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The endpoint does not expose the service the operation needs
    #[error("Service {service_type} not supported by {endpoint_id}")]
    UnsupportedService {
        service_type: String,
        endpoint_id: String,
    },

    /// Invalid parameter value supplied by the caller
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ApiError {
    /// True for failures of the underlying transport, including non-200 replies.
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. } | ApiError::HttpStatus { .. })
    }

    /// Transport classification, when the failure happened below HTTP.
    pub fn network_kind(&self) -> Option<NetworkErrorKind> {
        match self {
            ApiError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        ApiError::Protocol(message.into())
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<SoapError> for ApiError {
    fn from(error: SoapError) -> Self {
        match error {
            SoapError::Network { kind, message } => ApiError::Transport { kind, message },
            SoapError::Http { status, body } => ApiError::HttpStatus { status, body },
            SoapError::Parse(msg) => ApiError::Protocol(msg),
            SoapError::Fault(code) => ApiError::Protocol(format!("SOAP fault: error code {code}")),
            SoapError::MissingSid => ApiError::Protocol(SoapError::MissingSid.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soap_error_conversion() {
        let api_error: ApiError =
            SoapError::network(NetworkErrorKind::ConnectionRefused, "refused").into();
        assert!(api_error.is_transport());
        assert_eq!(api_error.network_kind(), Some(NetworkErrorKind::ConnectionRefused));

        let api_error: ApiError = SoapError::Http {
            status: 500,
            body: "busy".to_string(),
        }
        .into();
        assert!(api_error.is_transport());
        assert_eq!(api_error.network_kind(), None);

        let api_error: ApiError = SoapError::Parse("invalid XML".to_string()).into();
        assert!(matches!(api_error, ApiError::Protocol(_)));

        let api_error: ApiError = SoapError::Fault(401).into();
        assert!(matches!(api_error, ApiError::Protocol(ref m) if m.contains("401")));
    }

    #[test]
    fn test_unsupported_service_names_both_parts() {
        let err = ApiError::UnsupportedService {
            service_type: "urn:Belkin:service:bridge:1".to_string(),
            endpoint_id: "uuid:Socket-1_0-221517K0101769".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Service urn:Belkin:service:bridge:1 not supported by uuid:Socket-1_0-221517K0101769"
        );
    }
}
