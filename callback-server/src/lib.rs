//! UPnP callback server for receiving event notifications.
//!
//! This crate provides a lightweight HTTP listener for NOTIFY requests. It
//! knows nothing about devices: the request path is treated as an opaque
//! endpoint identifier and the body is handed, unparsed, to a
//! [`NotificationSink`].
//!
//! - [`CallbackServer`]: binds the first free port in a range and serves
//!   until shut down.
//! - [`EventRouter`]: forwards bodies to the sink and reports whether the
//!   identifier was known (204) or not (404).
//! - [`ChannelSink`]: a sink that forwards to an mpsc channel.
//!
//! This crate is intended for internal use within the workspace.

pub mod router;
mod server;

pub use router::{ChannelSink, EventRouter, NotificationPayload, NotificationSink};
pub use server::{routes, CallbackServer, CallbackServerError};
