//! Signed search-after cursors
//!
//! A token is `base64url(payload) "." base64url(hmac_sha256(payload))` where the
//! payload is `{"v": [sort values], "d": "next" | "prev", "o": ordering}`. The
//! ordering fingerprint ties a token to the view and sort it was issued for.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{QueryError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Direction of travel encoded in a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorDirection {
    Next,
    Prev,
}

impl CursorDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Prev => "prev",
        }
    }

    pub fn is_reverse(self) -> bool {
        matches!(self, Self::Prev)
    }
}

/// Decoded cursor: the sort tuple to search after, the direction and the
/// fingerprint of the ordering it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPosition {
    pub values: Vec<Value>,
    pub direction: CursorDirection,
    pub ordering: String,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    v: Vec<Value>,
    d: CursorDirection,
    o: String,
}

/// Short digest of a view name and its effective sort (`field:order` entries).
pub fn ordering_fingerprint<'s>(view: &str, sort: impl IntoIterator<Item = (&'s str, &'s str)>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(view.as_bytes());
    for (field, order) in sort {
        hasher.update(b"\n");
        hasher.update(field.as_bytes());
        hasher.update(b":");
        hasher.update(order.as_bytes());
    }
    URL_SAFE_NO_PAD.encode(&hasher.finalize()[..12])
}

#[derive(Clone)]
pub struct CursorCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorCodec").finish_non_exhaustive()
    }
}

impl CursorCodec {
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(QueryError::InvalidFieldConfig(
                "cursor secret must not be empty".into(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| QueryError::InvalidFieldConfig(format!("cursor secret rejected: {e}")))?;
        Ok(Self { mac })
    }

    pub fn encode(&self, position: &CursorPosition) -> Result<String> {
        let payload = serde_json::to_vec(&Payload {
            v: position.values.clone(),
            d: position.direction,
            o: position.ordering.clone(),
        })
        .map_err(|_| QueryError::InvalidCursor)?;
        let mut mac = self.mac.clone();
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();
        Ok(format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify and decode a client-supplied token. Any defect is `InvalidCursor`.
    pub fn decode(&self, token: &str) -> Result<CursorPosition> {
        let (payload, signature) = token.split_once('.').ok_or(QueryError::InvalidCursor)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| QueryError::InvalidCursor)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| QueryError::InvalidCursor)?;

        let mut mac = self.mac.clone();
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| QueryError::InvalidCursor)?;

        let payload: Payload =
            serde_json::from_slice(&payload).map_err(|_| QueryError::InvalidCursor)?;
        if payload.v.is_empty() {
            return Err(QueryError::InvalidCursor);
        }
        Ok(CursorPosition {
            values: payload.v,
            direction: payload.d,
            ordering: payload.o,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> CursorCodec {
        CursorCodec::new(b"test-secret").unwrap()
    }

    #[test]
    fn token_is_url_safe_and_decodes() {
        let position = CursorPosition {
            values: vec![json!("2001-01-01T00:00:00Z"), json!(1.5), json!("42")],
            direction: CursorDirection::Prev,
            ordering: "abc".into(),
        };
        let token = codec().encode(&position).unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
        assert_eq!(codec().decode(&token).unwrap(), position);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = codec()
            .encode(&CursorPosition {
                values: vec![json!(10), json!("a")],
                direction: CursorDirection::Next,
                ordering: "abc".into(),
            })
            .unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"v":[9999,"a"],"d":"next","o":"abc"}"#);
        assert_eq!(
            codec().decode(&format!("{forged}.{signature}")),
            Err(QueryError::InvalidCursor)
        );
    }

    #[test]
    fn other_secret_and_garbage_are_rejected() {
        let token = codec()
            .encode(&CursorPosition {
                values: vec![json!(1)],
                direction: CursorDirection::Next,
                ordering: "abc".into(),
            })
            .unwrap();
        let other = CursorCodec::new(b"another-secret").unwrap();
        assert_eq!(other.decode(&token), Err(QueryError::InvalidCursor));
        assert_eq!(codec().decode("not-a-cursor"), Err(QueryError::InvalidCursor));
        assert_eq!(codec().decode("%%%.%%%"), Err(QueryError::InvalidCursor));
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert!(matches!(
            CursorCodec::new(b""),
            Err(QueryError::InvalidFieldConfig(_))
        ));
    }

    #[test]
    fn fingerprint_depends_on_view_and_sort() {
        let base = ordering_fingerprint("book_feed", [("published", "desc"), ("_id", "desc")]);
        assert_eq!(
            base,
            ordering_fingerprint("book_feed", [("published", "desc"), ("_id", "desc")])
        );
        assert_ne!(
            base,
            ordering_fingerprint("book_feed", [("published", "asc"), ("_id", "asc")])
        );
        assert_ne!(
            base,
            ordering_fingerprint("books", [("published", "desc"), ("_id", "desc")])
        );
    }
}
