//! Streaming endpoint derivation from the hosting page origin.

use crate::{AtlasError, Result};
use url::Url;

/// Well-known path of the assistant session socket.
pub const DEFAULT_WS_PATH: &str = "/ws/atlas";

/// Map a page origin to the assistant socket URL.
///
/// `https` origins get `wss`, `http` origins get `ws`. Host and port are kept;
/// path, query and fragment are replaced.
pub fn endpoint_for_origin(origin: &str, path: &str) -> Result<Url> {
    let invalid = |reason: String| AtlasError::InvalidOrigin {
        origin: origin.to_string(),
        reason,
    };

    let mut url = Url::parse(origin).map_err(|e| invalid(e.to_string()))?;
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        // Already a socket URL; keep it.
        "wss" | "ws" => "",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    if !scheme.is_empty() {
        url.set_scheme(scheme)
            .map_err(|_| invalid(format!("cannot switch to '{}'", scheme)))?;
    }

    url.set_path(path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_origin_uses_ws() {
        let url = endpoint_for_origin("http://localhost:8000", DEFAULT_WS_PATH).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/atlas");
    }

    #[test]
    fn test_secure_origin_uses_wss() {
        let url = endpoint_for_origin("https://dash.example.com", DEFAULT_WS_PATH).unwrap();
        assert_eq!(url.as_str(), "wss://dash.example.com/ws/atlas");
    }

    #[test]
    fn test_page_path_and_query_are_dropped() {
        let url =
            endpoint_for_origin("https://dash.example.com:8443/today?tab=agenda#top", "/ws/atlas")
                .unwrap();
        assert_eq!(url.as_str(), "wss://dash.example.com:8443/ws/atlas");
    }

    #[test]
    fn test_socket_origin_is_kept() {
        let url = endpoint_for_origin("ws://127.0.0.1:9001", "/chat").unwrap();
        assert_eq!(url.as_str(), "ws://127.0.0.1:9001/chat");
    }

    #[test]
    fn test_invalid_origins() {
        assert!(matches!(
            endpoint_for_origin("ftp://example.com", DEFAULT_WS_PATH),
            Err(AtlasError::InvalidOrigin { .. })
        ));
        assert!(matches!(
            endpoint_for_origin("not a url", DEFAULT_WS_PATH),
            Err(AtlasError::InvalidOrigin { .. })
        ));
    }
}
