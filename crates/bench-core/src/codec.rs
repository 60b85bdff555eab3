//! Blob codec for [`WaveformBundle`].
//!
//! Layout: the 4-byte magic `WFB1` followed by the bincode encoding of the
//! bundle. The storage layer treats the result as opaque bytes.

use crate::error::{BenchError, BenchResult};
use crate::waveform::WaveformBundle;

/// Format marker at the start of every encoded bundle.
pub const MAGIC: &[u8; 4] = b"WFB1";

/// Encode a bundle for storage.
pub fn encode(bundle: &WaveformBundle) -> BenchResult<Vec<u8>> {
    let body = bincode::serialize(bundle).map_err(|e| BenchError::Codec(e.to_string()))?;
    let mut out = Vec::with_capacity(MAGIC.len() + body.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode a stored bundle, rejecting blobs without the expected magic.
pub fn decode(bytes: &[u8]) -> BenchResult<WaveformBundle> {
    let body = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| BenchError::Codec("missing WFB1 header".to_string()))?;
    bincode::deserialize(body).map_err(|e| BenchError::Codec(e.to_string()))
}
