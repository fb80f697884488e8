//! Event sink for a WebSocket connection.

use crate::error::WsResult;

/// Receives the semantic events of one connection.
///
/// Every callback runs synchronously on the thread that called
/// `WsClient::connect`; a slow callback backpressures the read loop. A
/// callback may be invoked while one of the application's own sends is
/// still in flight on another thread, so implementations must tolerate
/// that interleaving.
///
/// Returning `Err` from any callback terminates the connection with that
/// error, exactly as a stream failure would.
///
/// All methods default to `Ok(())`, so an implementation only overrides
/// the events it cares about.
pub trait WsListener: Send + Sync {
    /// The handshake completed; the connection is up.
    fn on_connected(&self) -> WsResult<()> {
        Ok(())
    }

    /// A text frame arrived. Invalid UTF-8 sequences have been replaced
    /// with U+FFFD.
    fn on_text(&self, _text: &str) -> WsResult<()> {
        Ok(())
    }

    /// A binary frame arrived.
    fn on_binary(&self, _payload: &[u8]) -> WsResult<()> {
        Ok(())
    }

    /// A ping arrived. The pong reply is sent automatically after this
    /// callback returns.
    fn on_ping(&self, _payload: &[u8]) -> WsResult<()> {
        Ok(())
    }

    /// A pong arrived.
    fn on_pong(&self, _payload: &[u8]) -> WsResult<()> {
        Ok(())
    }

    /// The server sent a close frame. No close frame is sent in reply;
    /// the connection simply winds down when the server drops it.
    fn on_server_requested_close(&self, _payload: &[u8]) -> WsResult<()> {
        Ok(())
    }

    /// A frame with an opcode outside the RFC 6455 set arrived.
    fn on_unknown(&self, _payload: &[u8]) -> WsResult<()> {
        Ok(())
    }
}
