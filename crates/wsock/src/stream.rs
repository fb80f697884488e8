//! Plain TCP / TLS stream abstraction for a client connection.
//!
//! `ws://` connections use a bare `TcpStream`; `wss://` wraps the same
//! socket in a rustls `StreamOwned` with the webpki root store. Both
//! variants implement `Read + Write`, so the frame and handshake codecs
//! never care which one they are talking to.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use rustls_pki_types::ServerName;

use crate::error::{WsError, WsResult};

pub(crate) enum WsStream {
    Plain(TcpStream),
    Tls(StreamOwned<ClientConnection, TcpStream>),
}

impl WsStream {
    /// Set the read timeout on the underlying TCP socket. Works for both
    /// variants since TLS reads block on the same socket.
    pub(crate) fn set_read_timeout(&self, dur: Option<Duration>) -> io::Result<()> {
        match self {
            WsStream::Plain(s) => s.set_read_timeout(dur),
            WsStream::Tls(s) => s.get_ref().set_read_timeout(dur),
        }
    }
}

impl Read for WsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            WsStream::Plain(s) => s.read(buf),
            WsStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for WsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            WsStream::Plain(s) => s.write(buf),
            WsStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            WsStream::Plain(s) => s.flush(),
            WsStream::Tls(s) => s.flush(),
        }
    }
}

/// Upgrade a connected TCP stream to TLS using rustls.
///
/// Server certificates are verified against the Mozilla root program via
/// `webpki-roots`; `hostname` must match the certificate.
pub(crate) fn upgrade_to_tls(
    stream: TcpStream,
    hostname: &str,
) -> WsResult<StreamOwned<ClientConnection, TcpStream>> {
    let root_store = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| WsError::Url(format!("invalid hostname for tls: {}", hostname)))?;
    let conn = ClientConnection::new(Arc::new(config), server_name)
        .map_err(|e| WsError::Io(io::Error::other(e)))?;
    Ok(StreamOwned::new(conn, stream))
}
