//! The subscription verbs the engine needs, behind a seam for testing.

use async_trait::async_trait;
use soap_client::{NetworkErrorKind, SoapClient, SoapError, SubscriptionResponse};

/// GENA subscription requests against one device address.
///
/// The production implementation is [`SoapClient`], whose blocking calls are
/// moved onto tokio's blocking pool.
#[async_trait]
pub trait EventTransport: Send + Sync + 'static {
    async fn subscribe(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError>;

    async fn renew(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError>;

    async fn unsubscribe(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        sid: &str,
    ) -> Result<(), SoapError>;
}

#[async_trait]
impl EventTransport for SoapClient {
    async fn subscribe(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let (client, host, path, callback) = (
            self.clone(),
            host.to_string(),
            event_path.to_string(),
            callback_url.to_string(),
        );
        blocking(move || client.subscribe(&host, port, &path, &callback, timeout_seconds)).await
    }

    async fn renew(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let (client, host, path, sid) = (
            self.clone(),
            host.to_string(),
            event_path.to_string(),
            sid.to_string(),
        );
        blocking(move || client.renew_subscription(&host, port, &path, &sid, timeout_seconds)).await
    }

    async fn unsubscribe(
        &self,
        host: &str,
        port: u16,
        event_path: &str,
        sid: &str,
    ) -> Result<(), SoapError> {
        let (client, host, path, sid) = (
            self.clone(),
            host.to_string(),
            event_path.to_string(),
            sid.to_string(),
        );
        blocking(move || SoapClient::unsubscribe(&client, &host, port, &path, &sid)).await
    }
}

async fn blocking<T, F>(call: F) -> Result<T, SoapError>
where
    F: FnOnce() -> Result<T, SoapError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call).await.map_err(|e| {
        SoapError::network(NetworkErrorKind::Other, format!("blocking request task failed: {e}"))
    })?
}
