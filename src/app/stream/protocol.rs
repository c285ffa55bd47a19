use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use core::fmt::Write as _;
use heapless::String;
use sha1::{Digest, Sha1};

/// RFC 6455 section 1.3 handshake GUID.
const WS_ACCEPT_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

// base64 of a 20-byte SHA-1 digest is always exactly 28 bytes.
pub(super) const WS_ACCEPT_LEN: usize = 28;
pub(super) const SAMPLE_PAYLOAD_MAX: usize = 32;
pub(super) const FRAME_HEADER_LEN: usize = 2;

const FRAME_FIN_TEXT: u8 = 0x81;
const FRAME_PAYLOAD_SHORT_MAX: usize = 125;

pub(super) fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

pub(super) fn parse_request_line(header: &str) -> Option<(&str, &str)> {
    let first_line = header.lines().next()?;
    let mut parts = first_line.split_ascii_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let _version = parts.next()?;
    Some((method, target))
}

fn header_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for line in header.lines().skip(1) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case(name) {
            return Some(value.trim());
        }
    }
    None
}

pub(super) fn is_websocket_upgrade(header: &str) -> bool {
    let upgrade = header_value(header, "upgrade")
        .map(|value| value.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    let connection = header_value(header, "connection")
        .map(|value| {
            value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        })
        .unwrap_or(false);
    upgrade && connection
}

pub(super) fn websocket_key(header: &str) -> Option<&str> {
    header_value(header, "sec-websocket-key")
}

/// `Sec-WebSocket-Accept`: base64(sha1(key ++ GUID)), RFC 6455 section 4.2.2.
pub(super) fn accept_key(key: &str) -> [u8; WS_ACCEPT_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_ACCEPT_GUID.as_bytes());
    let digest = hasher.finalize();

    let mut accept = [0u8; WS_ACCEPT_LEN];
    let written = BASE64.encode_slice(digest, &mut accept).unwrap_or(0);
    debug_assert_eq!(written, WS_ACCEPT_LEN);
    accept
}

/// Encodes one final, unmasked text frame. Sample payloads always fit the
/// short 7-bit length form; anything longer is refused rather than framed
/// with an extended length.
pub(super) fn encode_text_frame(payload: &str, out: &mut [u8]) -> Option<usize> {
    let len = payload.len();
    if len > FRAME_PAYLOAD_SHORT_MAX || out.len() < FRAME_HEADER_LEN + len {
        return None;
    }
    out[0] = FRAME_FIN_TEXT;
    out[1] = len as u8;
    out[FRAME_HEADER_LEN..FRAME_HEADER_LEN + len].copy_from_slice(payload.as_bytes());
    Some(FRAME_HEADER_LEN + len)
}

pub(super) fn sample_payload(value: i32) -> String<SAMPLE_PAYLOAD_MAX> {
    let mut payload = String::new();
    // i32 formatting always fits the fixed capacity.
    let _ = write!(payload, "{{\"value\": {}}}\n", value);
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE_REQUEST: &str = "GET /ws HTTP/1.1\r\n\
        Host: 192.168.1.50\r\n\
        Upgrade: websocket\r\n\
        Connection: keep-alive, Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13";

    #[test]
    fn finds_header_terminator() {
        assert_eq!(find_header_end(b"GET /ws HTTP/1.1\r\n\r\nrest"), Some(16));
        assert_eq!(find_header_end(b"GET /ws HTTP/1.1\r\n"), None);
    }

    #[test]
    fn parses_request_line() {
        assert_eq!(
            parse_request_line(UPGRADE_REQUEST),
            Some(("GET", "/ws"))
        );
        assert_eq!(parse_request_line("GET\r\n"), None);
    }

    #[test]
    fn detects_upgrade_headers() {
        assert!(is_websocket_upgrade(UPGRADE_REQUEST));
        assert!(!is_websocket_upgrade(
            "GET /ws HTTP/1.1\r\nHost: x\r\nConnection: keep-alive"
        ));
        assert!(!is_websocket_upgrade(
            "GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: close"
        ));
    }

    #[test]
    fn extracts_websocket_key() {
        assert_eq!(
            websocket_key(UPGRADE_REQUEST),
            Some("dGhlIHNhbXBsZSBub25jZQ==")
        );
    }

    #[test]
    fn computes_rfc6455_sample_accept_key() {
        // Worked example from RFC 6455 section 1.3.
        let accept = accept_key("dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(&accept, b"s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn encodes_final_text_frame() {
        let mut out = [0u8; 64];
        let len = encode_text_frame("{\"value\": 123}\n", &mut out).unwrap();
        assert_eq!(len, 17);
        assert_eq!(out[0], 0x81);
        assert_eq!(out[1], 15);
        assert_eq!(&out[2..len], b"{\"value\": 123}\n");
    }

    #[test]
    fn refuses_oversized_payload_and_short_buffer() {
        let mut out = [0u8; 8];
        assert_eq!(encode_text_frame("too long for buffer", &mut out), None);

        let mut big = [0u8; 256];
        let payload = core::str::from_utf8(&[b'x'; 126]).unwrap();
        assert_eq!(encode_text_frame(payload, &mut big), None);
    }

    #[test]
    fn formats_sample_payload() {
        assert_eq!(sample_payload(123).as_str(), "{\"value\": 123}\n");
        assert_eq!(sample_payload(-7).as_str(), "{\"value\": -7}\n");
    }
}
