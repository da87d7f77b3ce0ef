//! Uncompressed text codec.

use crate::error::{Error, Result};

use super::{Codec, WirePayload};

// ============================================================================
// TextCodec
// ============================================================================

/// Plain JSON text frames. The fallback codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCodec;

impl TextCodec {
    /// Scheme name used in `setCompression`.
    pub const NAME: &'static str = "text";
}

impl Codec for TextCodec {
    #[inline]
    fn name(&self) -> &str {
        Self::NAME
    }

    fn encode(&self, text: &str) -> Result<WirePayload> {
        Ok(WirePayload::Text(text.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<String> {
        String::from_utf8(data.to_vec()).map_err(|e| Error::codec(Self::NAME, e.to_string()))
    }

    #[inline]
    fn is_fallback(&self) -> bool {
        true
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_text() {
        let payload = TextCodec.encode(r#"{"type":"method"}"#).expect("encode");
        assert_eq!(payload, WirePayload::Text(r#"{"type":"method"}"#.into()));
    }

    #[test]
    fn test_decode_utf8() {
        let text = TextCodec.decode("{\"a\":\"é\"}".as_bytes()).expect("decode");
        assert_eq!(text, "{\"a\":\"é\"}");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        let err = TextCodec.decode(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
    }
}
