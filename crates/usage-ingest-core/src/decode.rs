//! Transport decoding: request body bytes to a JSON object.
//!
//! Decoding is a pure function of the body and its `Content-Encoding`. Size
//! ceilings are enforced twice: on the compressed body before any
//! decompression work, and on the decompressed stream while it is read.

use std::io::Read;

use flate2::read::{MultiGzDecoder, ZlibDecoder};
use serde_json::{Map, Value};

use crate::error::{IngestError, Result};

/// Default ceiling for a compressed request body (10 MiB).
pub const DEFAULT_MAX_COMPRESSED_BYTES: usize = 10 * 1024 * 1024;

/// Default ceiling for a decompressed request body (64 MiB).
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 64 * 1024 * 1024;

/// Byte ceilings applied while decoding a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimits {
    /// Maximum size of a compressed body, checked before decompression.
    pub max_compressed_bytes: usize,
    /// Maximum size of the body after decompression.
    pub max_decompressed_bytes: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_compressed_bytes: DEFAULT_MAX_COMPRESSED_BYTES,
            max_decompressed_bytes: DEFAULT_MAX_DECOMPRESSED_BYTES,
        }
    }
}

/// Supported body encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// Uncompressed body.
    Identity,
    /// gzip (RFC 1952), possibly multi-member.
    Gzip,
    /// zlib-wrapped deflate (RFC 1950), as sent for `Content-Encoding: deflate`.
    Deflate,
}

impl ContentEncoding {
    /// Parse a `Content-Encoding` header value.
    ///
    /// A missing or empty header is `Identity`.
    ///
    /// # Errors
    ///
    /// Returns `IngestError::MalformedPayload` for an unsupported encoding.
    pub fn parse(header: Option<&str>) -> Result<Self> {
        let Some(raw) = header.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(Self::Identity);
        };

        match raw.to_ascii_lowercase().as_str() {
            "identity" => Ok(Self::Identity),
            "gzip" | "x-gzip" => Ok(Self::Gzip),
            "deflate" => Ok(Self::Deflate),
            other => Err(IngestError::MalformedPayload(format!(
                "unsupported content encoding: {other}"
            ))),
        }
    }

    /// Whether the body needs decompression.
    #[must_use]
    pub const fn is_compressed(self) -> bool {
        !matches!(self, Self::Identity)
    }
}

/// Decode a raw request body into a JSON object.
///
/// # Errors
///
/// - `PayloadTooLarge` if the compressed body or its decompressed form exceeds `limits`.
/// - `MalformedPayload` if decompression fails, the JSON is invalid, or the
///   top-level value is not an object.
pub fn decode_body(
    raw: &[u8],
    content_encoding: Option<&str>,
    limits: &PayloadLimits,
) -> Result<Map<String, Value>> {
    let encoding = ContentEncoding::parse(content_encoding)?;

    let decompressed;
    let bytes = if encoding.is_compressed() {
        if raw.len() > limits.max_compressed_bytes {
            return Err(IngestError::PayloadTooLarge {
                size: raw.len(),
                limit: limits.max_compressed_bytes,
            });
        }
        decompressed = decompress(raw, encoding, limits.max_decompressed_bytes)?;
        decompressed.as_slice()
    } else {
        raw
    };

    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(IngestError::MalformedPayload(
            "request body must be a JSON object".into(),
        )),
        Err(e) => {
            tracing::debug!(error = %e, "Rejecting body with invalid JSON");
            Err(IngestError::MalformedPayload(format!("invalid JSON: {e}")))
        }
    }
}

fn decompress(raw: &[u8], encoding: ContentEncoding, limit: usize) -> Result<Vec<u8>> {
    let reader: Box<dyn Read + '_> = match encoding {
        ContentEncoding::Gzip => Box::new(MultiGzDecoder::new(raw)),
        ContentEncoding::Deflate => Box::new(ZlibDecoder::new(raw)),
        ContentEncoding::Identity => Box::new(raw),
    };

    // One byte past the limit is enough to tell an oversized stream apart.
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut out = Vec::new();
    reader.take(cap).read_to_end(&mut out).map_err(|e| {
        tracing::debug!(error = %e, ?encoding, "Failed to decompress body");
        IngestError::MalformedPayload(format!("invalid {encoding:?} payload").to_lowercase())
    })?;

    if out.len() > limit {
        return Err(IngestError::PayloadTooLarge {
            size: out.len(),
            limit,
        });
    }

    Ok(out)
}
