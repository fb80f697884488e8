//! `ws://` / `wss://` URL parsing.

use crate::error::{WsError, WsResult};

/// Parsed WebSocket URL components.
#[derive(Debug, Clone)]
pub(crate) struct WsUrl {
    /// `true` for `wss://` (TLS), `false` for `ws://`.
    pub secure: bool,
    pub host: String,
    pub port: u16,
    /// Raw path including any query string; `/` when the URL has none.
    pub path: String,
    /// The original URL string, sent verbatim as the `Origin` header.
    pub raw: String,
}

/// Parse a `ws://host[:port]/path` or `wss://host[:port]/path` URL.
///
/// Default ports are 80 (`ws`) and 443 (`wss`); an explicit port wins.
/// Any other scheme is an argument error.
pub(crate) fn parse_ws_url(url: &str) -> WsResult<WsUrl> {
    let (secure, rest) = if let Some(rest) = url.strip_prefix("ws://") {
        (false, rest)
    } else if let Some(rest) = url.strip_prefix("wss://") {
        (true, rest)
    } else {
        return Err(WsError::Url(format!(
            "unsupported scheme in {}: expected ws:// or wss://",
            url
        )));
    };

    let (host_port, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], rest[idx..].to_string()),
        None => (rest, "/".to_string()),
    };
    if host_port.is_empty() {
        return Err(WsError::Url(format!("missing host in {}", url)));
    }

    let (host, port) = if let Some((h, p)) = host_port.rsplit_once(':') {
        let port = p
            .parse::<u16>()
            .map_err(|_| WsError::Url(format!("invalid port: {}", p)))?;
        (h.to_string(), port)
    } else {
        (host_port.to_string(), if secure { 443 } else { 80 })
    };

    Ok(WsUrl {
        secure,
        host,
        port,
        path,
        raw: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_default_port() {
        let u = parse_ws_url("ws://example.com/chat").unwrap();
        assert!(!u.secure);
        assert_eq!(u.host, "example.com");
        assert_eq!(u.port, 80);
        assert_eq!(u.path, "/chat");
        assert_eq!(u.raw, "ws://example.com/chat");
    }

    #[test]
    fn test_tls_default_port() {
        let u = parse_ws_url("wss://example.com/chat").unwrap();
        assert!(u.secure);
        assert_eq!(u.port, 443);
    }

    #[test]
    fn test_explicit_port_overrides_default() {
        let u = parse_ws_url("ws://localhost:9001/x").unwrap();
        assert_eq!(u.host, "localhost");
        assert_eq!(u.port, 9001);
        assert_eq!(u.path, "/x");
    }

    #[test]
    fn test_missing_path_defaults_to_root() {
        let u = parse_ws_url("ws://example.com").unwrap();
        assert_eq!(u.path, "/");
        let u = parse_ws_url("ws://example.com:8080").unwrap();
        assert_eq!(u.port, 8080);
        assert_eq!(u.path, "/");
    }

    #[test]
    fn test_query_string_preserved() {
        let u = parse_ws_url("ws://example.com/a/b?token=1").unwrap();
        assert_eq!(u.path, "/a/b?token=1");
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let err = parse_ws_url("http://example.com/").unwrap_err();
        assert!(matches!(err, WsError::Url(_)), "got: {:?}", err);
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(parse_ws_url("ws://example.com:http/").is_err());
        assert!(parse_ws_url("ws://example.com:99999/").is_err());
    }

    #[test]
    fn test_missing_host_rejected() {
        assert!(parse_ws_url("ws:///chat").is_err());
    }
}
