//! Connection lifecycle, frame reader loop, and frame writer.
//!
//! One `WsClient` drives one connection at a time. The thread that calls
//! [`WsClient::connect`] owns the connection: it performs the TCP/TLS
//! connect and upgrade handshake, then becomes the single frame reader
//! and blocks until the connection dies. Any other thread may send frames
//! or interrupt.
//!
//! ## Architecture
//!
//! ```text
//! connect(url)  (caller's thread, blocks for the connection lifetime)
//!     |
//!     +-- parse url, Disconnected -> Connecting
//!     +-- TCP connect, install shutdown handle
//!     +-- TLS upgrade (wss only)
//!     +-- HTTP upgrade handshake, Connecting -> Connected
//!     +-- on_connected, then read loop (frame -> listener dispatch)
//!     +-- teardown: close socket, drain writers, -> Disconnected
//!
//! send_text / send_binary / send_ping   (any thread, serialized on the
//!     write lock; counted so teardown can drain them)
//!
//! interrupt   (any thread; closes the socket under the reader, waits
//!     until the connect thread has fully unwound)
//! ```
//!
//! ## Locking
//!
//! Two locks, never held together. The *state lock* guards the lifecycle
//! state, the shutdown handle, and the outstanding-writes counter, with
//! one broadcast condvar for both state changes and drain-to-zero. The
//! *write lock* is the mutex around the stream itself and serializes
//! frame emission.
//!
//! Blocking TLS streams cannot be split into independent read and write
//! halves, so the reader also goes through the write lock: it polls for
//! the first header byte under a short read timeout, releasing the lock
//! between polls so writers get through, and only holds the lock for the
//! remainder of a frame once its first byte has arrived.

use std::io::{self, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{WsError, WsResult};
use crate::frame::{self, WsFrame, WsOpcode};
use crate::handshake;
use crate::listener::WsListener;
use crate::rng;
use crate::stream::{WsStream, upgrade_to_tls};
use crate::url::{WsUrl, parse_ws_url};

/// Read timeout used by the reader's first-byte poll. Bounds both the
/// writers' contention window on the write lock and the latency with
/// which a pending interrupt is observed.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle state of the single connection a `WsClient` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection. The only state `connect` may start from.
    Disconnected,
    /// TCP/TLS connect and upgrade handshake in progress.
    Connecting,
    /// Handshake verified; frames flow in both directions.
    Connected,
    /// `interrupt` was observed; the connect thread is unwinding.
    Disconnecting,
}

struct Lifecycle {
    state: ConnectionState,
    /// Shared stream, present only while Connected. Its mutex is the
    /// write lock.
    stream: Option<Arc<Mutex<WsStream>>>,
    /// Clone of the raw TCP socket, used by `interrupt` to unblock the
    /// reader from another thread. Present from TCP connect to teardown.
    socket: Option<TcpStream>,
    /// Sends that have passed the state check but not yet finished.
    /// Teardown waits for this to drain to zero.
    pending_writes: usize,
    /// Number of `connect` invocations that have fully wound down. Lets
    /// `interrupt` distinguish "connect not started yet" (block) from
    /// "connection already over" (return at once).
    completed_runs: u64,
}

/// A client-side WebSocket endpoint: one long-lived connection over plain
/// or TLS-secured TCP.
pub struct WsClient {
    listener: Box<dyn WsListener>,
    lifecycle: Mutex<Lifecycle>,
    state_changed: Condvar,
}

impl WsClient {
    pub fn new<L: WsListener + 'static>(listener: L) -> WsClient {
        WsClient {
            listener: Box::new(listener),
            lifecycle: Mutex::new(Lifecycle {
                state: ConnectionState::Disconnected,
                stream: None,
                socket: None,
                pending_writes: 0,
                completed_runs: 0,
            }),
            state_changed: Condvar::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.lock().state
    }

    // -----------------------------------------------------------------------
    // Lifecycle: connect / interrupt
    // -----------------------------------------------------------------------

    /// Connect to `url` and run the connection on the calling thread.
    ///
    /// Blocks for the lifetime of the connection and, in practice, always
    /// returns `Err`: [`WsError::Interrupted`] if [`interrupt`] cancelled
    /// the connection, otherwise the I/O or protocol error that ended it.
    /// By the time it returns the state is back to `Disconnected` and all
    /// resources are released.
    ///
    /// Returns [`WsError::AlreadyConnected`] (without touching anything)
    /// if a connection is already running, and [`WsError::Url`] for an
    /// unusable URL.
    ///
    /// [`interrupt`]: WsClient::interrupt
    pub fn connect(&self, url: &str) -> WsResult<()> {
        let target = {
            let mut life = self.lifecycle.lock();
            if life.state != ConnectionState::Disconnected {
                return Err(WsError::AlreadyConnected);
            }
            // Argument errors leave the state untouched.
            let target = parse_ws_url(url)?;
            life.state = ConnectionState::Connecting;
            self.state_changed.notify_all();
            target
        };

        debug!(url, "connecting");
        let err = self.run_connection(&target);
        self.finish_connection(err)
    }

    /// Cancel the running connection from any thread.
    ///
    /// Called before `connect` has begun, blocks until it does. Called
    /// after a connection has fully wound down, returns immediately.
    /// Otherwise closes the socket out from under the reader, marks the
    /// state `Disconnecting`, and waits until the connect thread has
    /// raised [`WsError::Interrupted`] and released everything.
    pub fn interrupt(&self) {
        let mut life = self.lifecycle.lock();
        while life.state == ConnectionState::Disconnected {
            if life.completed_runs > 0 {
                return;
            }
            self.state_changed.wait(&mut life);
        }
        if matches!(
            life.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            // Closing the socket is the only way to unblock a reader stuck
            // in kernel I/O. Best-effort; the close also happens at teardown.
            if let Some(socket) = life.socket.as_ref() {
                let _ = socket.shutdown(Shutdown::Both);
            }
            life.state = ConnectionState::Disconnecting;
            self.state_changed.notify_all();
        }
        while life.state != ConnectionState::Disconnected {
            self.state_changed.wait(&mut life);
        }
    }

    /// Establish the connection and run the read loop; returns the error
    /// that terminated it.
    fn run_connection(&self, target: &WsUrl) -> WsError {
        let stream = match self.establish(target) {
            Ok(stream) => stream,
            Err(e) => return e,
        };
        let err = self.read_loop(&stream);
        debug!(error = %err, "read loop ended");
        err
    }

    /// TCP connect, TLS upgrade, HTTP upgrade handshake. Publishes the
    /// stream and moves to `Connected` on success.
    fn establish(&self, target: &WsUrl) -> WsResult<Arc<Mutex<WsStream>>> {
        let tcp = TcpStream::connect((target.host.as_str(), target.port))?;

        // Install the shutdown handle before any further blocking I/O so a
        // concurrent interrupt can close the socket out from under us.
        {
            let mut life = self.lifecycle.lock();
            if life.state == ConnectionState::Disconnecting {
                return Err(WsError::Interrupted);
            }
            life.socket = Some(tcp.try_clone()?);
        }
        debug!(host = %target.host, port = target.port, "tcp connected");

        let mut stream = if target.secure {
            let tls = upgrade_to_tls(tcp, &target.host)?;
            debug!("tls established");
            WsStream::Tls(tls)
        } else {
            WsStream::Plain(tcp)
        };

        let key = handshake::generate_key();
        handshake::send_upgrade_request(&mut stream, target, &key)?;
        handshake::read_upgrade_response(&mut stream, &key)?;
        debug!("handshake verified");

        stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        let shared = Arc::new(Mutex::new(stream));
        {
            let mut life = self.lifecycle.lock();
            if life.state == ConnectionState::Disconnecting {
                return Err(WsError::Interrupted);
            }
            life.stream = Some(shared.clone());
            life.state = ConnectionState::Connected;
            self.state_changed.notify_all();
        }

        self.listener.on_connected()?;
        Ok(shared)
    }

    /// Teardown: close the socket, drain outstanding writes, return to
    /// `Disconnected`, and rewrite the terminating error to `Interrupted`
    /// when the cancellation state was observed.
    fn finish_connection(&self, err: WsError) -> WsResult<()> {
        let mut life = self.lifecycle.lock();
        // Close first: a writer blocked in the kernel would otherwise
        // never finish and the drain below would never complete.
        if let Some(socket) = life.socket.take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
        while life.pending_writes > 0 {
            self.state_changed.wait(&mut life);
        }
        let interrupted = life.state == ConnectionState::Disconnecting;
        life.stream = None;
        life.state = ConnectionState::Disconnected;
        life.completed_runs += 1;
        self.state_changed.notify_all();
        drop(life);

        if interrupted {
            Err(WsError::Interrupted)
        } else {
            Err(err)
        }
    }

    // -----------------------------------------------------------------------
    // Reader
    // -----------------------------------------------------------------------

    /// Single-reader loop: one frame per iteration, dispatched to the
    /// listener, until the stream or the listener fails.
    fn read_loop(&self, stream: &Arc<Mutex<WsStream>>) -> WsError {
        loop {
            {
                let life = self.lifecycle.lock();
                if life.state == ConnectionState::Disconnecting {
                    return WsError::Interrupted;
                }
            }

            // Poll for the first header byte under the write lock, with the
            // short read timeout bounding how long writers can be held out.
            // Once the first byte is in, the rest of the frame is read to
            // completion with the timeout lifted -- a slow peer must not be
            // able to split a frame across poll windows.
            let frame = {
                let mut s = stream.lock();
                let first = match poll_one_byte(&mut *s) {
                    Ok(Some(byte)) => byte,
                    Ok(None) => continue,
                    Err(e) => return e.into(),
                };
                if let Err(e) = s.set_read_timeout(None) {
                    return e.into();
                }
                let result = frame::read_frame_after(first, &mut *s);
                if let Err(e) = s.set_read_timeout(Some(READ_POLL_INTERVAL)) {
                    return e.into();
                }
                match result {
                    Ok(frame) => frame,
                    Err(e) => return e,
                }
            };

            if let Err(e) = self.dispatch(frame) {
                return e;
            }
        }
    }

    /// Dispatch one frame to the listener by opcode.
    fn dispatch(&self, frame: WsFrame) -> WsResult<()> {
        match frame.opcode {
            WsOpcode::Text => {
                let text = String::from_utf8_lossy(&frame.payload);
                self.listener.on_text(&text)
            }
            WsOpcode::Binary => self.listener.on_binary(&frame.payload),
            WsOpcode::Close => self.listener.on_server_requested_close(&frame.payload),
            WsOpcode::Pong => self.listener.on_pong(&frame.payload),
            WsOpcode::Ping => {
                self.listener.on_ping(&frame.payload)?;
                // The pong goes through the regular writer path and may
                // itself fail; that failure ends the connection.
                self.send_frame(WsOpcode::Pong, &frame.payload)
            }
            WsOpcode::Unknown(_) => self.listener.on_unknown(&frame.payload),
            WsOpcode::Continuation => {
                unreachable!("continuation frames are rejected by the codec")
            }
        }
    }

    // -----------------------------------------------------------------------
    // Writer
    // -----------------------------------------------------------------------

    /// Send a text frame. Callable from any thread while connected.
    pub fn send_text(&self, text: &str) -> WsResult<()> {
        self.send_frame(WsOpcode::Text, text.as_bytes())
    }

    /// Send a binary frame. Callable from any thread while connected.
    pub fn send_binary(&self, payload: &[u8]) -> WsResult<()> {
        self.send_frame(WsOpcode::Binary, payload)
    }

    /// Send a ping frame. Callable from any thread while connected.
    pub fn send_ping(&self, payload: &[u8]) -> WsResult<()> {
        self.send_frame(WsOpcode::Ping, payload)
    }

    /// Common writer path: state check and counter increment under the
    /// state lock, frame emission under the write lock, decrement and
    /// notify on the way out.
    fn send_frame(&self, opcode: WsOpcode, payload: &[u8]) -> WsResult<()> {
        let stream = {
            let mut life = self.lifecycle.lock();
            let stream = match life.stream.clone() {
                Some(stream) if life.state == ConnectionState::Connected => stream,
                _ => return Err(WsError::NotConnected),
            };
            life.pending_writes += 1;
            stream
        };

        // Fresh mask per frame; None only in the degraded no-CSPRNG mode,
        // which sends the frame unmasked.
        let mask = rng::frame_mask();
        let result = {
            let mut s = stream.lock();
            frame::write_frame(&mut *s, opcode, payload, mask)
        };

        let mut life = self.lifecycle.lock();
        life.pending_writes -= 1;
        self.state_changed.notify_all();
        let disconnecting = life.state == ConnectionState::Disconnecting;
        drop(life);

        match result {
            Ok(()) => Ok(()),
            // A writer cut down mid-write by a local interrupt reports the
            // cancellation, not the incidental I/O error.
            Err(_) if disconnecting => Err(WsError::Interrupted),
            Err(e) => Err(e),
        }
    }
}

/// Read one byte, mapping a poll-timeout expiry to `Ok(None)`.
fn poll_one_byte(stream: &mut WsStream) -> io::Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match stream.read_exact(&mut byte) {
        Ok(()) => Ok(Some(byte[0])),
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::WsListener;

    struct NullListener;
    impl WsListener for NullListener {}

    #[test]
    fn test_initial_state_is_disconnected() {
        let client = WsClient::new(NullListener);
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_before_connect_is_not_connected() {
        let client = WsClient::new(NullListener);
        assert!(matches!(
            client.send_text("x"),
            Err(WsError::NotConnected)
        ));
        assert!(matches!(
            client.send_binary(&[1, 2]),
            Err(WsError::NotConnected)
        ));
        assert!(matches!(
            client.send_ping(&[]),
            Err(WsError::NotConnected)
        ));
    }

    #[test]
    fn test_connect_rejects_unknown_scheme() {
        let client = WsClient::new(NullListener);
        let err = client.connect("http://example.com/").unwrap_err();
        assert!(matches!(err, WsError::Url(_)), "got: {:?}", err);
        // An argument error must not leave the state machine dirty.
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
