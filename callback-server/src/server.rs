//! HTTP server for receiving event notifications.

use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warp::http::{Method, StatusCode};
use warp::path::Tail;
use warp::Filter;

use crate::router::EventRouter;

/// Errors raised while starting or stopping the callback server.
#[derive(Debug, Error)]
pub enum CallbackServerError {
    #[error("Invalid port range {start}-{end}")]
    InvalidPortRange { start: u16, end: u16 },

    #[error("No available port in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("Server task failed: {0}")]
    Task(String),
}

/// HTTP callback server for event notifications.
///
/// Devices deliver events with `NOTIFY /<endpoint-id>`. The identifier is
/// looked up through the [`EventRouter`]; a known identifier is answered with
/// 204, anything else (including other methods) with 404.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use callback_server::{CallbackServer, ChannelSink, EventRouter};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::unbounded_channel();
///     let sink = Arc::new(ChannelSink::new(tx));
///     sink.register("uuid:Socket-1_0-221517K0101769");
///
///     let server = CallbackServer::new((3500, 3600), None, EventRouter::new(sink))
///         .await
///         .expect("no free callback port");
///     println!("callbacks go to {}", server.base_url());
///
///     while let Some(notification) = rx.recv().await {
///         println!("{}: {}", notification.endpoint_id, notification.body);
///     }
/// }
/// ```
pub struct CallbackServer {
    port: u16,
    base_url: String,
    router: EventRouter,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind the first free port in `port_range` and start serving.
    ///
    /// The callback base URL uses `callback_host` when given, otherwise the
    /// address of the interface used for outbound traffic.
    pub async fn new(
        port_range: (u16, u16),
        callback_host: Option<IpAddr>,
        router: EventRouter,
    ) -> Result<Self, CallbackServerError> {
        let (start, end) = port_range;
        if start > end {
            return Err(CallbackServerError::InvalidPortRange { start, end });
        }

        let filter = routes(router.clone());

        for port in start..=end {
            let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
            let bind = warp::serve(filter.clone()).try_bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
                async move {
                    let _ = shutdown_rx.await;
                },
            );

            let (addr, server) = match bind {
                Ok(bound) => bound,
                Err(e) => {
                    debug!(port, error = %e, "callback port unavailable");
                    continue;
                }
            };

            let host = callback_host.or_else(detect_local_ip).unwrap_or_else(|| {
                warn!("Could not detect local address, using loopback for callbacks");
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            });
            let base_url = format!("http://{}", SocketAddr::new(host, addr.port()));

            info!(%addr, %base_url, "Callback server listening");

            return Ok(Self {
                port: addr.port(),
                base_url,
                router,
                shutdown_tx: Some(shutdown_tx),
                server_handle: Some(tokio::spawn(server)),
            });
        }

        Err(CallbackServerError::NoAvailablePort { start, end })
    }

    /// Base URL devices should call back to, without a path
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Stop accepting requests and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) -> Result<(), CallbackServerError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| CallbackServerError::Task(e.to_string()))?;
        }

        info!(port = self.port, "Callback server stopped");
        Ok(())
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// The notification filter on its own, for embedding or testing.
pub fn routes(
    router: EventRouter,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    warp::method()
        .and(warp::path::tail())
        .and(warp::body::bytes())
        .map(move |method: Method, tail: Tail, body: Bytes| {
            handle_request(&router, &method, tail.as_str(), body)
        })
        .recover(handle_rejection)
}

fn handle_request(router: &EventRouter, method: &Method, path: &str, body: Bytes) -> StatusCode {
    if method.as_str() != "NOTIFY" {
        debug!(%method, %path, "rejecting non-NOTIFY request");
        return StatusCode::NOT_FOUND;
    }

    let endpoint_id = path.trim_end_matches('/');
    if endpoint_id.is_empty() || endpoint_id.contains('/') {
        return StatusCode::NOT_FOUND;
    }

    let body = String::from_utf8_lossy(&body).into_owned();
    if router.route_event(endpoint_id, body) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn handle_rejection(err: warp::Rejection) -> Result<StatusCode, Infallible> {
    debug!(?err, "request rejected");
    Ok(StatusCode::BAD_REQUEST)
}

/// Address of the interface used for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only resolves the route.
fn detect_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip())
}
