//! Gzip codec.
//!
//! Frames are gzip-compressed JSON sent as binary WebSocket messages.
//! There is no marker byte; every binary message is a complete gzip
//! stream.

// ============================================================================
// Imports
// ============================================================================

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};

use super::{Codec, WirePayload};

// ============================================================================
// Constants
// ============================================================================

/// Default cap on the decompressed size of one message (16 MiB).
pub const DEFAULT_MAX_DECODED_LEN: usize = 16 * 1024 * 1024;

// ============================================================================
// GzipCodec
// ============================================================================

/// Gzip-compressed binary frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GzipCodec {
    level: Compression,
    /// Messages inflating past this many bytes are rejected.
    max_decoded_len: usize,
}

impl GzipCodec {
    /// Scheme name used in `setCompression`.
    pub const NAME: &'static str = "gzip";

    /// Creates a codec with a specific compression level (0-9).
    #[inline]
    #[must_use]
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
            ..Self::default()
        }
    }

    /// Sets the cap on the decompressed size of one message.
    #[inline]
    #[must_use]
    pub fn max_decoded_len(mut self, max: usize) -> Self {
        self.max_decoded_len = max;
        self
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: Compression::fast(),
            max_decoded_len: DEFAULT_MAX_DECODED_LEN,
        }
    }
}

impl Codec for GzipCodec {
    #[inline]
    fn name(&self) -> &str {
        Self::NAME
    }

    fn encode(&self, text: &str) -> Result<WirePayload> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(text.len() / 2), self.level);
        encoder
            .write_all(text.as_bytes())
            .map_err(|e| Error::codec(Self::NAME, format!("gzip write failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::codec(Self::NAME, format!("gzip finish failed: {e}")))?;

        Ok(WirePayload::Binary(compressed))
    }

    fn decode(&self, data: &[u8]) -> Result<String> {
        // One byte past the cap tells an exact fit from an overflow
        let limit = self.max_decoded_len as u64 + 1;
        let mut decoded = Vec::new();
        GzDecoder::new(data)
            .take(limit)
            .read_to_end(&mut decoded)
            .map_err(|e| Error::codec(Self::NAME, format!("gzip decompress failed: {e}")))?;

        if decoded.len() > self.max_decoded_len {
            return Err(Error::codec(
                Self::NAME,
                format!("decompressed message exceeds {} bytes", self.max_decoded_len),
            ));
        }

        String::from_utf8(decoded)
            .map_err(|e| Error::codec(Self::NAME, format!("invalid UTF-8: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================
