//! Gzip encoding of cached JSON payloads.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};

/// Stored form of a cached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "body", rename_all = "lowercase")]
pub enum Payload {
    Json(String),
    Gzip(Vec<u8>),
}

impl Payload {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Payload::Json(s) => s.len(),
            Payload::Gzip(b) => b.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        matches!(self, Payload::Gzip(_))
    }

    /// Encodes `json`, gzipping it when enabled, at least `threshold` bytes
    /// long and the result is actually smaller. Encoder failures fall back to
    /// plain JSON.
    #[must_use]
    pub fn encode(json: String, compress: bool, threshold: usize) -> Self {
        if !compress || json.len() < threshold {
            return Payload::Json(json);
        }
        match gzip(json.as_bytes()) {
            Ok(bytes) if bytes.len() < json.len() => Payload::Gzip(bytes),
            Ok(_) => Payload::Json(json),
            Err(e) => {
                log::warn!("gzip failed, storing uncompressed: {e}");
                Payload::Json(json)
            }
        }
    }

    /// Returns the JSON bytes. A gzip body that does not decode is handed
    /// back raw so the caller can try to parse it as JSON directly.
    #[must_use]
    pub fn decode(&self) -> Vec<u8> {
        match self {
            Payload::Json(s) => s.as_bytes().to_vec(),
            Payload::Gzip(b) => match gunzip(b) {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("gunzip failed, falling back to raw body: {e}");
                    b.clone()
                }
            },
        }
    }
}

fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
