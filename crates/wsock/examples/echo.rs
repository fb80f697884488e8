//! Connect to a WebSocket echo server, send a message, print what comes
//! back, then interrupt the connection.
//!
//! Usage: `cargo run --example echo [ws://host:port/path]`

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wsock::{WsClient, WsListener, WsResult};

struct Printer;

impl WsListener for Printer {
    fn on_connected(&self) -> WsResult<()> {
        println!("connected");
        Ok(())
    }
    fn on_text(&self, text: &str) -> WsResult<()> {
        println!("text: {text}");
        Ok(())
    }
    fn on_binary(&self, payload: &[u8]) -> WsResult<()> {
        println!("binary: {} bytes", payload.len());
        Ok(())
    }
    fn on_ping(&self, payload: &[u8]) -> WsResult<()> {
        println!("ping: {payload:?}");
        Ok(())
    }
    fn on_server_requested_close(&self, _payload: &[u8]) -> WsResult<()> {
        println!("server requested close");
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt().init();

    let url = env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001/echo".to_string());

    let client = Arc::new(WsClient::new(Printer));
    let sender = client.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        if let Err(e) = sender.send_text("hello from wsock") {
            eprintln!("send failed: {e}");
        }
        thread::sleep(Duration::from_secs(2));
        sender.interrupt();
    });

    // Blocks for the connection lifetime; always ends with the reason the
    // connection closed.
    if let Err(e) = client.connect(&url) {
        eprintln!("connection ended: {e}");
    }
}
