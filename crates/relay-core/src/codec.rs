//! Transport encoding for file content
//!
//! File bodies travel inside JSON as base64. Uploads may also arrive as a
//! `data:<mime>;base64,<payload>` URL, in which case the embedded MIME type
//! is used when the request does not name one.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{ProxyError, Result};

/// MIME type used when an upload names none
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Decoded upload payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedContent {
    pub bytes: Vec<u8>,
    /// MIME type taken from a data URL prefix, if there was one
    pub mime_type: Option<String>,
}

/// Decode a transport-encoded payload
pub fn decode_content(payload: &str) -> Result<DecodedContent> {
    let payload = payload.trim();

    let (mime_type, encoded) = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| ProxyError::Encoding("data URL has no ',' separator".into()))?;
            let media = header.strip_suffix(";base64").ok_or_else(|| {
                ProxyError::Encoding("only base64 data URLs are supported".into())
            })?;
            let mime = (!media.is_empty()).then(|| media.to_string());
            (mime, data)
        }
        None => (None, payload),
    };

    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    let bytes = STANDARD
        .decode(&compact)
        .or_else(|_| URL_SAFE.decode(&compact))
        .or_else(|_| STANDARD_NO_PAD.decode(&compact))
        .or_else(|_| URL_SAFE_NO_PAD.decode(&compact))
        .map_err(|e| ProxyError::Encoding(format!("invalid base64 content: {e}")))?;

    Ok(DecodedContent { bytes, mime_type })
}

/// Encode bytes for a JSON response
pub fn encode_content(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// SHA-256 digest of raw file bytes, reported so callers can verify transfers
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Compute digest from data
    pub fn from_data(data: &[u8]) -> Self {
        let result = Sha256::digest(data);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        Self(digest)
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_plain_base64() {
        let decoded = decode_content("aGVsbG8gd29ybGQ=").unwrap();
        assert_eq!(decoded.bytes, b"hello world");
        assert_eq!(decoded.mime_type, None);
    }

    #[test]
    fn test_wrapped_base64_tolerated() {
        let decoded = decode_content("aGVsbG8g\r\nd29ybGQ=\n").unwrap();
        assert_eq!(decoded.bytes, b"hello world");
    }

    #[test]
    fn test_data_url_carries_mime() {
        let decoded = decode_content("data:application/json;base64,e30=").unwrap();
        assert_eq!(decoded.bytes, b"{}");
        assert_eq!(decoded.mime_type.as_deref(), Some("application/json"));
    }

    #[test]
    fn test_non_base64_data_url_rejected() {
        let err = decode_content("data:text/plain,hello").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingError);
    }

    #[test]
    fn test_unpadded_base64() {
        assert_eq!(decode_content("aGk").unwrap().bytes, b"hi");
        // URL-safe alphabet without padding
        assert_eq!(decode_content("-_8").unwrap().bytes, vec![0xfb, 0xff]);
    }

    #[test]
    fn test_garbage_rejected() {
        let err = decode_content("@@not base64@@").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodingError);
    }

    #[test]
    fn test_empty_payload_is_empty_file() {
        assert!(decode_content("").unwrap().bytes.is_empty());
    }

    #[test]
    fn test_encode_matches_decode() {
        let data = [0u8, 159, 146, 150, 255];
        let encoded = encode_content(&data);
        assert_eq!(decode_content(&encoded).unwrap().bytes, data);
    }

    #[test]
    fn test_digest_hex() {
        let digest = ContentDigest::from_data(b"abc");
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest, ContentDigest::from_data(b"abc"));
    }
}
