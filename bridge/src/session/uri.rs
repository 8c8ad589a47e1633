//! Pairing URI parser.
//!
//! The wire grammar, shared by QR codes and deep links:
//!
//! ```text
//! wc:<topic>@<version>?bridge=<url-encoded wss URL>&key=<64 hex chars>[&role=extension]
//! ```
//!
//! The `CWE:` scheme is accepted identically and only changes the
//! [`SessionSource`] label. Deep-link routers often hand the whole URI over
//! percent-encoded; when no recognized scheme prefix is present the input is
//! decoded once before parsing.
//!
//! `wc:` is not a hierarchical scheme, so the authority part is rebuilt as
//! `scheme://rest` before handing it to the `url` crate: user-info becomes
//! the topic and the host position carries the version.

use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use url::Url;

use super::{key_from_slice, Session, SessionSource};
use crate::error::{BridgeError, BridgeResult};

/// Query key carrying the bridge relay URL.
const QUERY_BRIDGE: &str = "bridge";
/// Query key carrying the hex-encoded session key.
const QUERY_KEY: &str = "key";
/// Optional query key marking a browser-extension peer.
const QUERY_ROLE: &str = "role";
const ROLE_EXTENSION: &str = "extension";

pub(super) fn parse(input: &str) -> BridgeResult<Session> {
    let raw = input.trim();

    let owned;
    let candidate = match source_of(raw) {
        Some(_) => raw,
        // No recognized scheme: a percent-encoded URI gets one decode pass.
        None if raw.contains('%') => {
            owned = percent_decode_str(raw)
                .decode_utf8()
                .map_err(|e| BridgeError::InvalidUri(format!("bad percent-encoding: {e}")))?
                .into_owned();
            owned.as_str()
        }
        None => return Err(BridgeError::InvalidUri("unrecognized scheme".into())),
    };

    let source = source_of(candidate)
        .ok_or_else(|| BridgeError::InvalidUri("unrecognized scheme".into()))?;

    let (scheme, rest) = candidate
        .split_once(':')
        .ok_or_else(|| BridgeError::InvalidUri("missing scheme separator".into()))?;
    let rest = rest.trim_start_matches('/');

    let url = Url::parse(&format!("{}://{}", scheme.to_ascii_lowercase(), rest))
        .map_err(|e| BridgeError::InvalidUri(format!("unparseable URI: {e}")))?;

    let topic = percent_decode_str(url.username())
        .decode_utf8()
        .map_err(|e| BridgeError::InvalidUri(format!("bad topic encoding: {e}")))?
        .into_owned();
    if topic.is_empty() {
        return Err(BridgeError::InvalidUri("missing topic".into()));
    }

    let version = url
        .host_str()
        .ok_or_else(|| BridgeError::InvalidUri("missing version".into()))?
        .to_string();
    let numerical_version = version.parse::<f64>().unwrap_or(1.0);

    let query: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let bridge = query
        .get(QUERY_BRIDGE)
        .ok_or_else(|| BridgeError::InvalidUri("missing bridge parameter".into()))?;
    let bridge = Url::parse(bridge)
        .map_err(|e| BridgeError::InvalidUri(format!("bad bridge URL: {e}")))?;
    if !matches!(bridge.scheme(), "https" | "wss") {
        return Err(BridgeError::InvalidUri(format!(
            "bridge must be https or wss, got {}",
            bridge.scheme()
        )));
    }

    let key_hex = query
        .get(QUERY_KEY)
        .ok_or_else(|| BridgeError::InvalidUri("missing key parameter".into()))?;
    let key_bytes = hex::decode(key_hex)
        .map_err(|e| BridgeError::InvalidUri(format!("key is not hex: {e}")))?;
    let key = key_from_slice(&key_bytes)?;

    let is_extension = query
        .get(QUERY_ROLE)
        .is_some_and(|role| role == ROLE_EXTENSION);

    Ok(Session {
        topic,
        version,
        bridge,
        key,
        numerical_version,
        source,
        is_extension,
    })
}

/// Maps a recognized scheme prefix to its source label.
fn source_of(input: &str) -> Option<SessionSource> {
    let scheme = input.split(':').next()?;
    if scheme.eq_ignore_ascii_case("wc") {
        Some(SessionSource::Wc)
    } else if scheme.eq_ignore_ascii_case("cwe") {
        Some(SessionSource::Cwe)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn pairing_uri() -> String {
        format!("wc:abc-123@1?bridge=https%3A%2F%2Fb.example%2F&key={KEY_HEX}")
    }

    #[test]
    fn parses_canonical_uri() {
        let session = parse(&pairing_uri()).unwrap();

        assert_eq!(session.topic, "abc-123");
        assert_eq!(session.version, "1");
        assert_eq!(session.numerical_version, 1.0);
        assert_eq!(session.bridge.as_str(), "https://b.example/");
        assert_eq!(session.source, SessionSource::Wc);
        assert!(!session.is_extension);

        let expected: Vec<u8> = (0u8..32).collect();
        assert_eq!(session.key.as_slice(), expected.as_slice());
    }

    #[test]
    fn decodes_fully_percent_encoded_input_once() {
        let encoded: String = pairing_uri()
            .replace('%', "%25")
            .replace(':', "%3A")
            .replace('@', "%40")
            .replace('?', "%3F")
            .replace('&', "%26")
            .replace('=', "%3D");
        assert!(!encoded.starts_with("wc:"));

        let session = parse(&encoded).unwrap();
        assert_eq!(session.topic, "abc-123");
        assert_eq!(session.bridge.as_str(), "https://b.example/");
    }

    #[test]
    fn cwe_scheme_sets_source_and_role_sets_extension() {
        let uri = format!(
            "CWE:topic-9@2?bridge=wss%3A%2F%2Frelay.example%2F&key={KEY_HEX}&role=extension"
        );
        let session = parse(&uri).unwrap();

        assert_eq!(session.source, SessionSource::Cwe);
        assert_eq!(session.version, "2");
        assert_eq!(session.numerical_version, 2.0);
        assert!(session.is_extension);
        assert_eq!(session.bridge.scheme(), "wss");
    }

    #[test]
    fn unparseable_version_defaults_to_one() {
        let uri = format!("wc:t-1@beta?bridge=https%3A%2F%2Fb.example%2F&key={KEY_HEX}");
        let session = parse(&uri).unwrap();
        assert_eq!(session.version, "beta");
        assert_eq!(session.numerical_version, 1.0);
    }

    #[test]
    fn rejects_unknown_scheme() {
        let err = parse("mailto:someone@example.com").unwrap_err();
        assert!(matches!(err, BridgeError::InvalidUri(_)));
    }

    #[test]
    fn rejects_missing_bridge() {
        let uri = format!("wc:abc@1?key={KEY_HEX}");
        assert!(matches!(
            parse(&uri).unwrap_err(),
            BridgeError::InvalidUri(_)
        ));
    }

    #[test]
    fn rejects_missing_key() {
        let uri = "wc:abc@1?bridge=https%3A%2F%2Fb.example%2F";
        assert!(matches!(parse(uri).unwrap_err(), BridgeError::InvalidUri(_)));
    }

    #[test]
    fn rejects_short_key() {
        let uri = "wc:abc@1?bridge=https%3A%2F%2Fb.example%2F&key=00112233";
        assert!(matches!(parse(uri).unwrap_err(), BridgeError::InvalidUri(_)));
    }

    #[test]
    fn rejects_non_hex_key() {
        let uri = format!(
            "wc:abc@1?bridge=https%3A%2F%2Fb.example%2F&key={}",
            "zz".repeat(32)
        );
        assert!(matches!(
            parse(&uri).unwrap_err(),
            BridgeError::InvalidUri(_)
        ));
    }

    #[test]
    fn rejects_non_websocket_bridge_scheme() {
        let uri = format!("wc:abc@1?bridge=ftp%3A%2F%2Fb.example%2F&key={KEY_HEX}");
        assert!(matches!(
            parse(&uri).unwrap_err(),
            BridgeError::InvalidUri(_)
        ));
    }
}
