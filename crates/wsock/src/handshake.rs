//! Client side of the WebSocket HTTP upgrade handshake (RFC 6455 Section 4.1).
//!
//! Writes the one-shot `GET` upgrade request, reads the HTTP/1.1 response
//! line by line, and validates `Sec-WebSocket-Accept` against the nonce
//! that was sent.
//!
//! - [`generate_key`]: Base64 of a fresh 16-byte nonce
//! - [`compute_accept_key`]: SHA-1 + Base64 computation per RFC 6455 Section 4.2.2
//! - [`send_upgrade_request`]: Writes the upgrade request
//! - [`read_upgrade_response`]: Reads and validates the 101 response
//!
//! The response is read **one byte at a time**. The server may follow its
//! `101` with frames immediately, so nothing past the terminating blank
//! line may be consumed here -- a buffered reader would swallow those
//! frame bytes.

use std::io::{Read, Write};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::error::{WsError, WsResult};
use crate::rng;
use crate::url::WsUrl;

/// RFC 6455 magic GUID concatenated with the client key for Sec-WebSocket-Accept.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Upper bound on a single response header line. A status or header line
/// longer than this is treated as a malformed response.
const MAX_LINE_LEN: usize = 16 * 1024;

/// Generate the `Sec-WebSocket-Key` value: Base64 (unwrapped) of a fresh
/// 16-byte nonce. Zero-filled nonce in the degraded no-CSPRNG mode.
pub(crate) fn generate_key() -> String {
    BASE64.encode(rng::handshake_nonce())
}

/// Compute the expected `Sec-WebSocket-Accept` value per RFC 6455
/// Section 4.2.2: Base64(SHA-1(`client_key` + [`WS_GUID`])).
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Write the HTTP upgrade request for `target`, carrying `key` as the
/// handshake nonce. The URL's raw path goes out verbatim; the original
/// URL string is sent as `Origin`.
pub(crate) fn send_upgrade_request<W: Write>(
    stream: &mut W,
    target: &WsUrl,
    key: &str,
) -> WsResult<()> {
    write!(
        stream,
        "GET {path} HTTP/1.1\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Host: {host}\r\n\
         Origin: {origin}\r\n\
         Sec-WebSocket-Key: {key}\r\n\
         Sec-WebSocket-Protocol: chat\r\n\
         Sec-WebSocket-Version: 13\r\n\
         \r\n",
        path = target.path,
        host = target.host,
        origin = target.raw,
        key = key,
    )?;
    stream.flush()?;
    Ok(())
}

/// Read one CRLF-terminated line, byte by byte, without the trailing
/// `\r\n`.
fn read_header_line<R: Read>(stream: &mut R) -> WsResult<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        stream.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
        if line.len() > MAX_LINE_LEN {
            return Err(WsError::Protocol("oversized header line".to_string()));
        }
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    String::from_utf8(line).map_err(|_| WsError::Protocol("non-utf8 header line".to_string()))
}

/// Read the server's handshake response and validate it against the key
/// sent in the request.
///
/// The status line must be `HTTP/1.1 101 ...`; headers are read until the
/// blank line, names compared case-insensitively.
pub(crate) fn read_upgrade_response<R: Read>(stream: &mut R, sent_key: &str) -> WsResult<()> {
    let status_line = read_header_line(stream)?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    let code = parts.next().unwrap_or("");
    if version != "HTTP/1.1" || code != "101" {
        return Err(WsError::Protocol(format!("wrong response: {}", status_line)));
    }

    let mut headers: Vec<(String, String)> = Vec::new();
    loop {
        let line = read_header_line(stream)?;
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    validate_upgrade_response(&headers, sent_key)
}

/// Validate the parsed response headers.
///
/// `Sec-WebSocket-Accept` must be present exactly once and match the
/// expected digest of the sent key.
pub(crate) fn validate_upgrade_response(
    headers: &[(String, String)],
    sent_key: &str,
) -> WsResult<()> {
    let mut accept: Option<&str> = None;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("Sec-WebSocket-Accept") {
            if accept.is_some() {
                return Err(WsError::Protocol(
                    "duplicate Sec-WebSocket-Accept header".to_string(),
                ));
            }
            accept = Some(value.as_str());
        }
    }
    match accept {
        Some(value) if value == compute_accept_key(sent_key) => {}
        Some(_) => {
            return Err(WsError::Protocol(
                "Sec-WebSocket-Accept mismatch".to_string(),
            ));
        }
        None => {
            return Err(WsError::Protocol(
                "missing Sec-WebSocket-Accept header".to_string(),
            ));
        }
    }

    // A response that selects the offered `chat` subprotocol is refused.
    // Intentional: the negotiation story for subprotocols is unsettled and
    // the check is kept as shipped; see the crate-level docs.
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("Sec-WebSocket-Protocol") && value == "chat" {
            return Err(WsError::Protocol(
                "unsupported subprotocol selection: chat".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::parse_ws_url;
    use std::io::Cursor;

    #[test]
    fn test_accept_key_rfc_example() {
        // RFC 6455 Section 4.2.2 test vector
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let accept = compute_accept_key(key);
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_generated_key_is_16_byte_base64() {
        let key = generate_key();
        let decoded = BASE64.decode(&key).expect("key should be valid base64");
        assert_eq!(decoded.len(), 16);
        assert!(!key.contains('\n'), "key must not be line-wrapped");
    }

    #[test]
    fn test_request_format() {
        let target = parse_ws_url("ws://example.com:9001/chat?x=1").unwrap();
        let mut buf = Vec::new();
        send_upgrade_request(&mut buf, &target, "KEYKEYKEY").unwrap();
        let request = String::from_utf8(buf).unwrap();
        assert!(request.starts_with("GET /chat?x=1 HTTP/1.1\r\n"), "{}", request);
        assert!(request.contains("Upgrade: websocket\r\n"));
        assert!(request.contains("Connection: Upgrade\r\n"));
        assert!(request.contains("Host: example.com\r\n"));
        assert!(request.contains("Origin: ws://example.com:9001/chat?x=1\r\n"));
        assert!(request.contains("Sec-WebSocket-Key: KEYKEYKEY\r\n"));
        assert!(request.contains("Sec-WebSocket-Protocol: chat\r\n"));
        assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_request_path_defaults_to_root() {
        let target = parse_ws_url("ws://example.com").unwrap();
        let mut buf = Vec::new();
        send_upgrade_request(&mut buf, &target, "k").unwrap();
        let request = String::from_utf8(buf).unwrap();
        assert!(request.starts_with("GET / HTTP/1.1\r\n"));
    }

    fn response_for(key: &str, extra_headers: &str) -> String {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\
             {}\r\n",
            compute_accept_key(key),
            extra_headers
        )
    }

    #[test]
    fn test_valid_response_accepted() {
        let response = response_for("mykey", "");
        let mut cursor = Cursor::new(response.into_bytes());
        read_upgrade_response(&mut cursor, "mykey").unwrap();
    }

    #[test]
    fn test_no_bytes_consumed_past_blank_line() {
        // A frame following the response must be left in the stream.
        let mut bytes = response_for("mykey", "").into_bytes();
        let response_len = bytes.len() as u64;
        bytes.extend_from_slice(&[0x81, 0x02, b'h', b'i']);
        let mut cursor = Cursor::new(bytes);
        read_upgrade_response(&mut cursor, "mykey").unwrap();
        assert_eq!(cursor.position(), response_len);
    }

    #[test]
    fn test_header_names_case_insensitive() {
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             sec-websocket-accept: {}\r\n\
             \r\n",
            compute_accept_key("mykey")
        );
        let mut cursor = Cursor::new(response.into_bytes());
        read_upgrade_response(&mut cursor, "mykey").unwrap();
    }

    #[test]
    fn test_non_101_status_rejected() {
        let response = "HTTP/1.1 200 OK\r\n\r\n";
        let mut cursor = Cursor::new(response.as_bytes().to_vec());
        let err = read_upgrade_response(&mut cursor, "mykey").unwrap_err();
        assert!(
            matches!(&err, WsError::Protocol(msg) if msg.contains("200")),
            "got: {:?}",
            err
        );
    }

    #[test]
    fn test_missing_accept_rejected() {
        let response = "HTTP/1.1 101 Switching Protocols\r\n\
                        Upgrade: websocket\r\n\
                        \r\n";
        let mut cursor = Cursor::new(response.as_bytes().to_vec());
        let err = read_upgrade_response(&mut cursor, "mykey").unwrap_err();
        assert!(
            matches!(&err, WsError::Protocol(msg) if msg.contains("missing Sec-WebSocket-Accept")),
            "got: {:?}",
            err
        );
    }

    #[test]
    fn test_duplicate_accept_rejected() {
        let accept = compute_accept_key("mykey");
        let response = format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Sec-WebSocket-Accept: {accept}\r\n\
             Sec-WebSocket-Accept: {accept}\r\n\
             \r\n"
        );
        let mut cursor = Cursor::new(response.into_bytes());
        let err = read_upgrade_response(&mut cursor, "mykey").unwrap_err();
        assert!(
            matches!(&err, WsError::Protocol(msg) if msg.contains("duplicate")),
            "got: {:?}",
            err
        );
    }

    #[test]
    fn test_mismatched_accept_rejected() {
        let response = "HTTP/1.1 101 Switching Protocols\r\n\
                        Sec-WebSocket-Accept: bm90IHRoZSByaWdodCBkaWdlc3Q=\r\n\
                        \r\n";
        let mut cursor = Cursor::new(response.as_bytes().to_vec());
        let err = read_upgrade_response(&mut cursor, "mykey").unwrap_err();
        assert!(
            matches!(&err, WsError::Protocol(msg) if msg.contains("mismatch")),
            "got: {:?}",
            err
        );
    }

    #[test]
    fn test_chat_subprotocol_selection_rejected() {
        let response = response_for("mykey", "Sec-WebSocket-Protocol: chat\r\n");
        let mut cursor = Cursor::new(response.into_bytes());
        let err = read_upgrade_response(&mut cursor, "mykey").unwrap_err();
        assert!(
            matches!(&err, WsError::Protocol(msg) if msg.contains("chat")),
            "got: {:?}",
            err
        );
    }

    #[test]
    fn test_other_subprotocol_selection_accepted() {
        let response = response_for("mykey", "Sec-WebSocket-Protocol: graphql-ws\r\n");
        let mut cursor = Cursor::new(response.into_bytes());
        read_upgrade_response(&mut cursor, "mykey").unwrap();
    }
}
