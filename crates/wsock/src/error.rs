//! Error taxonomy for the WebSocket client.
//!
//! Exactly three error kinds are visible on an established connection:
//! [`WsError::Io`] (the socket failed), [`WsError::Protocol`] (the server
//! violated RFC 6455 or asked for something this client does not support),
//! and [`WsError::Interrupted`] (a local [`interrupt`] was honored).
//! The remaining variants are precondition and argument failures raised
//! before any I/O happens.
//!
//! [`interrupt`]: crate::client::WsClient::interrupt

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WsError {
    /// Underlying socket connect/read/write failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The server sent something RFC 6455 does not allow here, or asked
    /// for a feature this client does not implement.
    #[error("wrong response: {0}")]
    Protocol(String),

    /// The connection was cancelled locally via `interrupt`.
    #[error("connection interrupted")]
    Interrupted,

    /// A send was attempted while no connection is established.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called while a connection is already running.
    #[error("connect may only be called when disconnected")]
    AlreadyConnected,

    /// The connection URL could not be parsed.
    #[error("invalid url: {0}")]
    Url(String),
}

pub type WsResult<T> = Result<T, WsError>;
