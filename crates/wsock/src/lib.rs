//! Client-side WebSocket endpoint (RFC 6455, protocol version 13).
//!
//! One long-lived connection over plain TCP (`ws://`) or rustls-backed
//! TLS (`wss://`): the opening HTTP upgrade handshake, a single-reader
//! frame loop dispatching semantic events to a [`WsListener`], and a
//! multi-producer masked frame writer.
//!
//! ## Modules
//!
//! - [`client`]: connection lifecycle, reader loop, writer
//! - [`frame`]: frame codec (header bit layout, extended lengths, XOR masking)
//! - [`handshake`]: one-shot HTTP/1.1 upgrade request/response
//! - [`listener`]: event sink trait
//! - [`error`]: error taxonomy
//!
//! ## Threading model
//!
//! The thread that calls [`WsClient::connect`] becomes the reader and
//! blocks for the connection's lifetime; any other thread may call the
//! `send_*` family or [`WsClient::interrupt`]. Writers are serialized on
//! a write lock so frames never interleave on the wire; `interrupt` is
//! the sole cancellation mechanism and works by closing the socket out
//! from under the blocked reader.
//!
//! ## Known limitations
//!
//! - Fragmented messages are not supported: any non-final frame or
//!   continuation frame terminates the connection with a protocol error.
//! - No close handshake is initiated locally; a server close frame is
//!   surfaced to the listener and the connection ends when the socket does.
//! - A handshake response selecting the offered `chat` subprotocol is
//!   refused; subprotocol negotiation is otherwise ignored.
//! - If the OS CSPRNG is unavailable the client degrades, permanently for
//!   the process, to sending *unmasked* frames (RFC 6455 Section 5.1
//!   requires masking). The degradation is logged via `tracing`.

pub mod client;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod listener;
mod rng;
mod stream;
mod url;

pub use client::{ConnectionState, WsClient};
pub use error::{WsError, WsResult};
pub use frame::{WsFrame, WsOpcode, apply_mask, read_frame, write_frame};
pub use handshake::compute_accept_key;
pub use listener::WsListener;
